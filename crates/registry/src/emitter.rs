use crate::agents::render_agents;
use crate::config::EmitterConfig;
use crate::error::{RegistryError, Result};
use crate::routes::render_routes;
use crate::writer::{write_artifacts, Artifact, WriteReport};
use discovery_protocol::DiscoveryManifest;
use std::path::Path;

/// Artifacts rendered in memory, not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// `agents.ts`, `routes.ts`, `metadata.json`, in that order
    pub artifacts: Vec<Artifact>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    pub write: WriteReport,
    pub warnings: Vec<String>,
}

/// Renders a discovery manifest into registry artifacts
pub struct RegistryEmitter {
    config: EmitterConfig,
}

impl RegistryEmitter {
    pub fn new(config: EmitterConfig) -> Result<Self> {
        config.validate().map_err(RegistryError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    fn artifact_path(&self, file: &str) -> String {
        format!("{}/{file}", self.config.output_dir())
    }

    /// Render every artifact. Output depends only on the manifest's content,
    /// never on the order its entries arrive in.
    pub fn render(&self, manifest: &DiscoveryManifest) -> Result<Rendered> {
        let mut manifest = manifest.clone();
        manifest
            .agents
            .sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
        manifest
            .routes
            .sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));

        let output_dir = self.config.output_dir();
        let agents = render_agents(&manifest.agents, &self.config.runtime_module, output_dir);
        let routes = render_routes(
            &manifest.routes,
            &manifest.agents,
            &self.config.runtime_module,
            output_dir,
        )?;
        let mut metadata = serde_json::to_string_pretty(&manifest)?;
        metadata.push('\n');

        Ok(Rendered {
            artifacts: vec![
                Artifact::new(self.artifact_path(&self.config.agents_file), agents),
                Artifact::new(self.artifact_path(&self.config.routes_file), routes.text),
                Artifact::new(self.artifact_path(&self.config.metadata_file), metadata),
            ],
            warnings: routes.warnings,
        })
    }

    /// Render, then write all artifacts below `root` as one set.
    pub async fn emit(&self, root: &Path, manifest: &DiscoveryManifest) -> Result<EmitReport> {
        let rendered = self.render(manifest)?;
        let write = write_artifacts(root, &rendered.artifacts).await?;
        Ok(EmitReport {
            write,
            warnings: rendered.warnings,
        })
    }
}
