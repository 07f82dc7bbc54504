use serde::{Deserialize, Serialize};

/// Where and how registry artifacts are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Output directory, relative to the project root
    pub output_dir: String,

    /// Module that provides runtime types and hosts the registry extension point
    pub runtime_module: String,

    pub agents_file: String,
    pub routes_file: String,
    pub metadata_file: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            output_dir: "src/generated".to_string(),
            runtime_module: "@agents/runtime".to_string(),
            agents_file: "agents.ts".to_string(),
            routes_file: "routes.ts".to_string(),
            metadata_file: "metadata.json".to_string(),
        }
    }
}

impl EmitterConfig {
    /// Output directory without surrounding slashes
    pub fn output_dir(&self) -> &str {
        self.output_dir.trim_matches('/')
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.output_dir().is_empty() {
            return Err("output_dir must not be empty".to_string());
        }
        if self.output_dir.split('/').any(|part| part == "..") {
            return Err(format!("output_dir ({}) must stay inside the project", self.output_dir));
        }
        if self.runtime_module.trim().is_empty() {
            return Err("runtime_module must not be empty".to_string());
        }
        let files = [&self.agents_file, &self.routes_file, &self.metadata_file];
        for file in files {
            if file.is_empty() || file.contains('/') {
                return Err(format!("artifact file name '{file}' must be a plain file name"));
            }
        }
        if files[0] == files[1] || files[1] == files[2] || files[0] == files[2] {
            return Err("artifact file names must be distinct".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EmitterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EmitterConfig::default();

        config.output_dir = "../elsewhere".to_string();
        assert!(config.validate().is_err());

        config.output_dir = "/".to_string();
        assert!(config.validate().is_err());

        config.output_dir = "src/generated/".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_dir(), "src/generated");

        config.routes_file = config.agents_file.clone();
        assert!(config.validate().is_err());
    }
}
