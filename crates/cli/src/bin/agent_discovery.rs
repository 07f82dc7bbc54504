use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    discovery_cli::main_entry().await
}
