use serde::{Deserialize, Serialize};

/// Callee names the extractor recognises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Factory creating an agent: `createAgent(name, config)`
    pub agent_factory: String,

    /// Factory creating an eval: `createEval(name, config)` or `agent.createEval(...)`
    pub eval_factory: String,

    /// Factory creating a router: `createRouter()`
    pub router_factory: String,

    /// Route middleware marking a route as validated: `validator({ input, output })`
    pub validator: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            agent_factory: "createAgent".to_string(),
            eval_factory: "createEval".to_string(),
            router_factory: "createRouter".to_string(),
            validator: "validator".to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let names = [
            ("agent_factory", &self.agent_factory),
            ("eval_factory", &self.eval_factory),
            ("router_factory", &self.router_factory),
            ("validator", &self.validator),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(format!("{field} must not be empty"));
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            {
                return Err(format!("{field} ({value}) is not a bare identifier"));
            }
        }
        if self.agent_factory == self.eval_factory {
            return Err("agent_factory and eval_factory must differ".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExtractorConfig::default();

        config.validator = " ".to_string();
        assert!(config.validate().is_err());

        config.validator = "check.schema".to_string();
        assert!(config.validate().is_err());

        config.validator = "validator".to_string();
        config.eval_factory = config.agent_factory.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExtractorConfig =
            serde_json::from_str(r#"{"agent_factory":"defineAgent"}"#).unwrap();
        assert_eq!(config.agent_factory, "defineAgent");
        assert_eq!(config.router_factory, "createRouter");
    }
}
