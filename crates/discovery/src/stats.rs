use serde::{Deserialize, Serialize};

/// Statistics about one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    /// Files matched by any role glob
    pub files: usize,

    /// Files per role ("agent", "eval", "route")
    pub roles: std::collections::BTreeMap<String, usize>,

    /// Files that parsed with syntax errors
    pub files_with_errors: usize,

    pub agents: usize,
    pub evals: usize,
    pub routes: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Recoverable problems, in file order
    pub warnings: Vec<String>,
}

impl DiscoveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, role: &str, has_errors: bool) {
        self.files += 1;
        *self.roles.entry(role.to_string()).or_insert(0) += 1;
        if has_errors {
            self.files_with_errors += 1;
        }
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}
