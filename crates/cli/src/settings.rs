//! Project settings: `discovery.toml` (or JSON) plus command-line overrides.
//!
//! Discovery options live at the top level of the file; registry output
//! options live under an `[emitter]` table.

use anyhow::{Context as AnyhowContext, Result};
use discovery_engine::{DiscoveryConfig, CONFIG_FILE_NAME};
use discovery_registry::EmitterConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub project_scope: Option<String>,
    pub deployment_scope: Option<String>,
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub discovery: DiscoveryConfig,
    pub emitter: EmitterConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmitterSection {
    emitter: EmitterConfig,
}

fn parse_emitter(bytes: &[u8]) -> Result<EmitterConfig> {
    let section: EmitterSection = match serde_json::from_slice(bytes) {
        Ok(section) => section,
        Err(_) => {
            let text = std::str::from_utf8(bytes).context("config is not valid UTF-8")?;
            toml::from_str(text).context("invalid [emitter] table")?
        }
    };
    Ok(section.emitter)
}

impl Settings {
    /// Load settings for `root`. An explicit config path must exist; the
    /// conventional `discovery.toml` is optional.
    pub fn load(root: &Path, overrides: &Overrides) -> Result<Self> {
        let path = match &overrides.config {
            Some(path) => Some(path.clone()),
            None => {
                let default = root.join(CONFIG_FILE_NAME);
                default.is_file().then_some(default)
            }
        };

        let (mut discovery, mut emitter) = match &path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                let discovery = DiscoveryConfig::parse(&bytes)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid config {}", path.display()))?;
                let emitter = parse_emitter(&bytes)
                    .with_context(|| format!("Invalid config {}", path.display()))?;
                log::debug!("Loaded config from {}", path.display());
                (discovery, emitter)
            }
            None => (DiscoveryConfig::default(), EmitterConfig::default()),
        };

        if let Some(scope) = &overrides.project_scope {
            discovery.project_scope = scope.clone();
        }
        if let Some(scope) = &overrides.deployment_scope {
            discovery.deployment_scope = Some(scope.clone());
        }
        if let Some(dir) = &overrides.output_dir {
            emitter.output_dir = dir.clone();
        }

        // Generated files are never read back as sources
        let output_dir = emitter.output_dir().to_string();
        if !output_dir.is_empty() && !discovery.ignored_dirs.contains(&output_dir) {
            discovery.ignored_dirs.push(output_dir);
        }

        discovery
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid discovery configuration (set project_scope in discovery.toml or pass --project-scope)")?;
        emitter
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid emitter configuration")?;

        Ok(Self { discovery, emitter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_both_sections_from_toml() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "project_scope = \"shop\"\n\n[emitter]\noutput_dir = \"gen\"\n",
        )
        .unwrap();

        let settings = Settings::load(temp.path(), &Overrides::default()).unwrap();
        assert_eq!(settings.discovery.project_scope, "shop");
        assert_eq!(settings.emitter.output_dir, "gen");
        assert_eq!(settings.emitter.runtime_module, "@agents/runtime");
        assert!(settings.discovery.ignored_dirs.contains(&"gen".to_string()));
    }

    #[test]
    fn flags_override_file_values() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "project_scope = \"shop\"\n",
        )
        .unwrap();

        let overrides = Overrides {
            project_scope: Some("store".to_string()),
            deployment_scope: Some("prod".to_string()),
            output_dir: Some("out".to_string()),
            ..Overrides::default()
        };
        let settings = Settings::load(temp.path(), &overrides).unwrap();
        assert_eq!(settings.discovery.project_scope, "store");
        assert_eq!(settings.discovery.deployment_scope.as_deref(), Some("prod"));
        assert_eq!(settings.emitter.output_dir, "out");
    }

    #[test]
    fn missing_project_scope_is_an_error() {
        let temp = tempdir().unwrap();
        let err = Settings::load(temp.path(), &Overrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("project_scope"));
    }

    #[test]
    fn json_config_is_accepted() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("discovery.json");
        std::fs::write(
            &path,
            r#"{"project_scope":"shop","emitter":{"runtime_module":"@acme/agents"}}"#,
        )
        .unwrap();

        let overrides = Overrides {
            config: Some(path),
            ..Overrides::default()
        };
        let settings = Settings::load(temp.path(), &overrides).unwrap();
        assert_eq!(settings.emitter.runtime_module, "@acme/agents");
    }
}
