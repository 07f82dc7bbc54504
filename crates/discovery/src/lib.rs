//! # Discovery Engine
//!
//! One discovery pass over a project: find declaration files, extract them in
//! parallel, then validate the complete set.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware, glob roles)
//!     │      └─> agent / eval / route files
//!     │
//!     ├──> Extraction (parallel batches, spawn_blocking)
//!     │      └─> ExtractedFile + content version
//!     │
//!     │   ── barrier ──
//!     │
//!     └──> Cross-file validation
//!            ├─> canonical names, duplicate routes
//!            ├─> eval owners, parents, route agents
//!            └─> DiscoveryResult (sorted)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use discovery_engine::{AgentDiscovery, DiscoveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DiscoveryConfig::for_project("shop");
//!     let discovery = AgentDiscovery::new("/path/to/project", config)?;
//!     let result = discovery.discover().await?;
//!
//!     println!("Found {} agents, {} routes", result.agents.len(), result.routes.len());
//!     Ok(())
//! }
//! ```

mod config;
mod discovery;
mod error;
mod identity;
mod link;
mod scanner;
mod stats;

pub use config::{DiscoveryConfig, CONFIG_FILE_NAME};
pub use discovery::{AgentDiscovery, DiscoveryResult};
pub use error::{DiscoveryError, Result};
pub use identity::IdentityGenerator;
pub use link::{resolve_module, route_path, DiscoveredFile};
pub use scanner::{FileScanner, ScanReport, ScannedFile};
pub use stats::DiscoveryStats;
