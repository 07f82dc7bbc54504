use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use discovery_engine::AgentDiscovery;
use discovery_registry::RegistryEmitter;
use report::RunReport;
use settings::{Overrides, Settings};
use std::io;
use std::path::PathBuf;

mod report;
mod settings;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "agent-discovery")]
#[command(about = "Discover agents and routes and generate typed registries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, validate and write the registry artifacts
    Build(ProjectArgs),

    /// Discover and validate without writing anything
    Check(ProjectArgs),

    /// Print the JSON schema of metadata.json
    Schema,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/discovery.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project namespace hashed into identities
    #[arg(long)]
    project_scope: Option<String>,

    /// Deployment namespace for content-scoped ids
    #[arg(long)]
    deployment_scope: Option<String>,

    /// Output directory for generated artifacts, relative to the root
    #[arg(long)]
    out: Option<String>,

    /// Print a JSON report on stdout
    #[arg(long)]
    json: bool,
}

impl ProjectArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            project_scope: self.project_scope.clone(),
            deployment_scope: self.deployment_scope.clone(),
            output_dir: self.out.clone(),
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Build(args) => run_project(args, true).await?,
        Commands::Check(args) => run_project(args, false).await?,
        Commands::Schema => {
            let schema = serde_json::to_string_pretty(&discovery_protocol::metadata_json_schema())?;
            print_stdout(&schema)?;
        }
    }

    Ok(())
}

async fn run_project(args: ProjectArgs, write: bool) -> Result<()> {
    let settings = Settings::load(&args.root, &args.overrides())?;
    let discovery = AgentDiscovery::new(&args.root, settings.discovery)
        .with_context(|| format!("Cannot discover in {}", args.root.display()))?;
    let result = discovery.discover().await.context("Discovery failed")?;

    let emitter = RegistryEmitter::new(settings.emitter)?;
    let manifest = result.manifest();
    let report = if write {
        let emitted = emitter
            .emit(&args.root, &manifest)
            .await
            .context("Failed to write registry artifacts")?;
        RunReport::new(&result, emitted.warnings).with_write(emitted.write)
    } else {
        let rendered = emitter
            .render(&manifest)
            .context("Failed to render registry artifacts")?;
        RunReport::new(&result, rendered.warnings)
    };

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&report)?)?;
    } else {
        print_stdout(report.render_text().trim_end())?;
    }
    Ok(())
}
