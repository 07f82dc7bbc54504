//! # Discovery Registry
//!
//! Turns a discovery manifest into the generated registry artifacts.
//!
//! ## Artifacts
//!
//! ```text
//! DiscoveryManifest
//!     │
//!     ├──> agents.ts      flat canonical-name → agent map, per-agent types,
//!     │                   AgentRegistry extension point
//!     │
//!     ├──> routes.ts      per-route types (NoSchema when nothing resolved),
//!     │                   flat registries, RouteTree type + routeTree object
//!     │
//!     └──> metadata.json  serialised manifest
//! ```
//!
//! Everything is rendered in memory first and written as one set.
//!
//! ## Example
//!
//! ```no_run
//! use discovery_registry::{EmitterConfig, RegistryEmitter};
//! # async fn run(manifest: discovery_protocol::DiscoveryManifest) -> Result<(), Box<dyn std::error::Error>> {
//! let emitter = RegistryEmitter::new(EmitterConfig::default())?;
//! let report = emitter.emit(std::path::Path::new("."), &manifest).await?;
//! println!("{} written, {} unchanged", report.write.written.len(), report.write.unchanged.len());
//! # Ok(())
//! # }
//! ```

mod agents;
mod config;
mod emitter;
mod error;
mod module_path;
mod route_tree;
mod routes;
mod ts;
mod writer;

pub use agents::{render_agents, AgentNames};
pub use config::EmitterConfig;
pub use emitter::{EmitReport, RegistryEmitter, Rendered};
pub use error::{RegistryError, Result};
pub use discovery_protocol::route_type_name;
pub use route_tree::{LeafSlot, RouteLeaf, RouteTree, TreeNode, TsType, NO_SCHEMA};
pub use routes::{render_routes, RenderedRoutes};
pub use writer::{write_artifacts, Artifact, WriteReport};
