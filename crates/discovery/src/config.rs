use crate::error::{DiscoveryError, Result};
use discovery_parser::ExtractorConfig;
use discovery_protocol::NamespaceContext;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SOURCE_EXTENSIONS: &str = "{ts,tsx,js,jsx,mts}";

/// Conventional name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "discovery.toml";

/// Configuration of one discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Project namespace hashed into every identity (required)
    pub project_scope: String,

    /// Optional deployment namespace, only affects content-scoped ids
    pub deployment_scope: Option<String>,

    /// Globs selecting agent files, relative to the root
    pub agent_globs: Vec<String>,

    /// Globs selecting eval files; checked before agent globs
    pub eval_globs: Vec<String>,

    /// Globs selecting route files
    pub route_globs: Vec<String>,

    /// Directory whose layout maps onto route paths
    pub route_root: String,

    /// Prefix every route path is mounted under
    pub route_mount_prefix: String,

    /// Files above this size are skipped
    pub max_file_size_bytes: u64,

    /// Files processed concurrently per batch
    pub max_concurrency: usize,

    /// Extra directory names to skip, on top of the built-in list
    pub ignored_dirs: Vec<String>,

    /// Factory names recognised in sources
    pub extractor: ExtractorConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            project_scope: String::new(),
            deployment_scope: None,
            agent_globs: vec![
                format!("src/agent/**/agent.{SOURCE_EXTENSIONS}"),
                format!("src/agent/**/index.{SOURCE_EXTENSIONS}"),
            ],
            eval_globs: vec![
                format!("src/agent/**/eval.{SOURCE_EXTENSIONS}"),
                format!("src/agent/**/*.eval.{SOURCE_EXTENSIONS}"),
            ],
            route_globs: vec![format!("src/api/**/*.{SOURCE_EXTENSIONS}")],
            route_root: "src/api".to_string(),
            route_mount_prefix: "/api".to_string(),
            max_file_size_bytes: 1_048_576, // 1 MB
            max_concurrency: default_concurrency(),
            ignored_dirs: Vec::new(),
            extractor: ExtractorConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(2, 8)
}

impl DiscoveryConfig {
    /// Defaults with the given project scope
    pub fn for_project(project_scope: impl Into<String>) -> Self {
        Self {
            project_scope: project_scope.into(),
            ..Self::default()
        }
    }

    pub fn namespace(&self) -> NamespaceContext {
        NamespaceContext::new(self.project_scope.clone(), self.deployment_scope.clone())
    }

    /// Load configuration from a TOML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes).map_err(|err| {
            DiscoveryError::invalid_config(format!("{}: {err}", path.display()))
        })
    }

    /// Parse configuration text, JSON first, then TOML
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let value: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(json_err) => {
                let utf8 = std::str::from_utf8(bytes).map_err(|err| format!("{json_err}; {err}"))?;
                let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                    format!("not valid JSON or TOML ({json_err}); TOML parse error: {toml_err}")
                })?;
                serde_json::to_value(toml_value)
                    .map_err(|err| format!("failed to convert TOML to JSON: {err}"))?
            }
        };
        serde_json::from_value(value).map_err(|err| format!("config parse error: {err}"))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.project_scope.trim().is_empty() {
            return Err("project_scope must be set".to_string());
        }
        if self
            .deployment_scope
            .as_deref()
            .is_some_and(|scope| scope.trim().is_empty())
        {
            return Err("deployment_scope must not be blank when set".to_string());
        }
        if self.agent_globs.is_empty() {
            return Err("agent_globs must not be empty".to_string());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        if self.max_file_size_bytes == 0 {
            return Err("max_file_size_bytes must be greater than 0".to_string());
        }
        if !self.route_mount_prefix.is_empty() && !self.route_mount_prefix.starts_with('/') {
            return Err(format!(
                "route_mount_prefix ({}) must start with '/'",
                self.route_mount_prefix
            ));
        }
        for glob in self
            .agent_globs
            .iter()
            .chain(&self.eval_globs)
            .chain(&self.route_globs)
        {
            globset::Glob::new(glob).map_err(|err| format!("invalid glob '{glob}': {err}"))?;
        }
        self.extractor.validate()
    }
}
