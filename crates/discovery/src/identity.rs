use discovery_protocol::{
    Identity, NamespaceContext, RouteKind, AGENT_CONTENT_PREFIX, AGENT_IDENTITY_PREFIX,
    EVAL_CONTENT_PREFIX, EVAL_IDENTITY_PREFIX, IDENTITY_HEX_LEN, ROUTE_IDENTITY_PREFIX,
};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Deterministic identities for discovered declarations.
///
/// Every id is a SHA-256 over its inputs, each followed by a NUL byte so that
/// `("ab", "c")` and `("a", "bc")` never hash alike.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    namespace: NamespaceContext,
}

impl IdentityGenerator {
    pub fn new(namespace: NamespaceContext) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &NamespaceContext {
        &self.namespace
    }

    /// Content version: full hex digest of the canonical file text
    #[must_use]
    pub fn version(canonical_text: &str) -> String {
        hex_encode_lower(&Sha256::digest(canonical_text.as_bytes()))
    }

    #[must_use]
    pub fn agent(&self, name: &str, filename: &str, version: &str) -> Identity {
        Identity {
            version: version.to_string(),
            identity_id: prefixed(
                AGENT_IDENTITY_PREFIX,
                &[self.namespace.project_scope.as_str(), "agent", name],
            ),
            content_scoped_id: prefixed(
                AGENT_CONTENT_PREFIX,
                &[
                    self.namespace.project_scope.as_str(),
                    self.namespace.deployment_or_empty(),
                    filename,
                    version,
                ],
            ),
        }
    }

    #[must_use]
    pub fn eval(&self, agent_name: &str, eval_name: &str, filename: &str, version: &str) -> Identity {
        Identity {
            version: version.to_string(),
            identity_id: prefixed(
                EVAL_IDENTITY_PREFIX,
                &[self.namespace.project_scope.as_str(), "eval", agent_name, eval_name],
            ),
            content_scoped_id: prefixed(
                EVAL_CONTENT_PREFIX,
                &[
                    self.namespace.project_scope.as_str(),
                    self.namespace.deployment_or_empty(),
                    filename,
                    version,
                    eval_name,
                ],
            ),
        }
    }

    #[must_use]
    pub fn route_id(&self, kind: RouteKind, path: &str) -> String {
        let key = kind.registry_key(path);
        prefixed(
            ROUTE_IDENTITY_PREFIX,
            &[self.namespace.project_scope.as_str(), "route", key.as_str()],
        )
    }
}

fn prefixed(prefix: &str, parts: &[&str]) -> String {
    let mut hex = digest_parts(parts);
    hex.truncate(IDENTITY_HEX_LEN);
    format!("{prefix}{hex}")
}

fn digest_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex_encode_lower(&hasher.finalize())
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    fn generator(deployment: Option<&str>) -> IdentityGenerator {
        IdentityGenerator::new(NamespaceContext::new(
            "shop",
            deployment.map(str::to_string),
        ))
    }

    #[test]
    fn version_is_full_sha256() {
        // sha256("")
        assert_eq!(
            IdentityGenerator::version(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn ids_have_prefix_and_fixed_length() {
        let identity = generator(None).agent("hello", "src/agent/hello/agent.ts", "v1");
        assert!(identity.identity_id.starts_with("agentid_"));
        assert_eq!(identity.identity_id.len(), "agentid_".len() + IDENTITY_HEX_LEN);
        assert!(identity.content_scoped_id.starts_with("agent_"));
        assert!(identity.identity_id["agentid_".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn identity_survives_content_changes() {
        let g = generator(None);
        let before = g.agent("hello", "src/agent/hello/agent.ts", "v1");
        let after = g.agent("hello", "src/agent/hello/agent.ts", "v2");
        assert_eq!(before.identity_id, after.identity_id);
        assert_ne!(before.content_scoped_id, after.content_scoped_id);
    }

    #[test]
    fn deployment_scope_only_moves_content_id() {
        let a = generator(None).agent("hello", "f.ts", "v");
        let b = generator(Some("prod")).agent("hello", "f.ts", "v");
        assert_eq!(a.identity_id, b.identity_id);
        assert_ne!(a.content_scoped_id, b.content_scoped_id);
    }

    #[test]
    fn separator_prevents_boundary_ambiguity() {
        assert_ne!(digest_parts(&["ab", "c"]), digest_parts(&["a", "bc"]));
    }

    #[test]
    fn eval_and_route_ids() {
        let g = generator(None);
        let eval = g.eval("hello", "tone", "src/agent/hello/eval.ts", "v");
        assert!(eval.identity_id.starts_with("evalid_"));
        assert!(eval.content_scoped_id.starts_with("eval_"));
        assert_ne!(
            eval.identity_id,
            g.eval("other", "tone", "src/agent/hello/eval.ts", "v").identity_id
        );

        let get = g.route_id(RouteKind::Get, "/api/users");
        assert!(get.starts_with("routeid_"));
        assert_ne!(get, g.route_id(RouteKind::Post, "/api/users"));
        assert_eq!(get, generator(Some("prod")).route_id(RouteKind::Get, "/api/users"));
    }
}
