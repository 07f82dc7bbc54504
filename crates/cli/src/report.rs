use discovery_engine::{DiscoveryResult, DiscoveryStats};
use discovery_protocol::NamespaceContext;
use discovery_registry::WriteReport;
use serde::Serialize;

/// Machine-readable outcome of `build` and `check`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(flatten)]
    pub namespace: NamespaceContext,
    pub agents: Vec<AgentLine>,
    pub routes: Vec<String>,
    pub stats: DiscoveryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unchanged: Option<Vec<String>>,
    /// Discovery warnings followed by emitter warnings
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLine {
    pub name: String,
    pub identity_id: String,
    pub evals: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subagents: Vec<String>,
}

impl RunReport {
    pub fn new(result: &DiscoveryResult, emitter_warnings: Vec<String>) -> Self {
        let agents = result
            .agents
            .iter()
            .map(|agent| AgentLine {
                name: agent.canonical_name.clone(),
                identity_id: agent.identity.identity_id.clone(),
                evals: agent.evals.len(),
                subagents: agent.subagents.clone(),
            })
            .collect();
        let routes = result.routes.iter().map(|route| route.registry_key()).collect();
        let mut warnings = result.stats.warnings.clone();
        warnings.extend(emitter_warnings);
        Self {
            namespace: result.namespace.clone(),
            agents,
            routes,
            stats: result.stats.clone(),
            written: None,
            unchanged: None,
            warnings,
        }
    }

    pub fn with_write(mut self, write: WriteReport) -> Self {
        self.written = Some(write.written);
        self.unchanged = Some(write.unchanged);
        self
    }

    /// Plain-text summary for terminals
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} agents, {} evals, {} routes from {} files in {} ms\n",
            self.stats.agents, self.stats.evals, self.stats.routes, self.stats.files, self.stats.time_ms
        ));
        for agent in &self.agents {
            out.push_str(&format!("  agent {} ({})", agent.name, agent.identity_id));
            if agent.evals > 0 {
                out.push_str(&format!(", {} evals", agent.evals));
            }
            if !agent.subagents.is_empty() {
                out.push_str(&format!(", subagents: {}", agent.subagents.join(", ")));
            }
            out.push('\n');
        }
        for route in &self.routes {
            out.push_str(&format!("  route {route}\n"));
        }
        if let Some(written) = &self.written {
            for path in written {
                out.push_str(&format!("wrote {path}\n"));
            }
        }
        if let Some(unchanged) = &self.unchanged {
            if !unchanged.is_empty() {
                out.push_str(&format!("{} artifacts unchanged\n", unchanged.len()));
            }
        }
        for warning in &self.warnings {
            out.push_str(&format!("warning: {warning}\n"));
        }
        out
    }
}
