//! Canonical registry keys and collision detection.
//!
//! Hyphens, underscores, spaces and case differences all fold into one
//! lower-camel-case key, so `my-agent`, `my_agent` and `My Agent` compete for
//! the same registry slot. The first repeat is an error; nothing is renamed.

use heck::{ToLowerCamelCase, ToUpperCamelCase};
use std::collections::HashMap;
use thiserror::Error;

/// Where a candidate key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Name exactly as declared
    pub name: String,
    pub file: String,
}

impl Origin {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({})", self.name, self.file)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("name collision on '{key}': {first} and {second} fold to the same key")]
pub struct NameCollision {
    pub key: String,
    pub first: Origin,
    pub second: Origin,
}

/// Fold a name into lower camel case; `None` when nothing identifier-like remains.
#[must_use]
pub fn fold_identifier(raw: &str) -> Option<String> {
    let folded = raw.to_lower_camel_case();
    if folded.is_empty() {
        return None;
    }
    Some(prefix_leading_digit(folded))
}

/// Canonical registry key for a declared name. Always a valid bare identifier.
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    fold_identifier(raw).unwrap_or_else(|| "_".to_string())
}

/// PascalCase type name for generated aliases.
#[must_use]
pub fn type_name(raw: &str) -> String {
    let folded = raw.to_upper_camel_case();
    if folded.is_empty() {
        return "_".to_string();
    }
    prefix_leading_digit(folded)
}

fn prefix_leading_digit(value: String) -> String {
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{value}")
    } else {
        value
    }
}

/// Tracks canonical keys seen so far within one key space.
#[derive(Debug, Default)]
pub struct CollisionDetector {
    seen: HashMap<String, Origin>,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name under its canonical key, returning the key.
    pub fn register(&mut self, origin: Origin) -> Result<String, NameCollision> {
        let key = canonical_name(&origin.name);
        self.register_key(key, origin)
    }

    /// Register an already-canonicalised key.
    pub fn register_key(&mut self, key: String, origin: Origin) -> Result<String, NameCollision> {
        if let Some(first) = self.seen.get(&key) {
            return Err(NameCollision {
                key,
                first: first.clone(),
                second: origin,
            });
        }
        self.seen.insert(key.clone(), origin);
        Ok(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn folds_separators_and_case() {
        assert_eq!(canonical_name("my-agent"), "myAgent");
        assert_eq!(canonical_name("my_agent"), "myAgent");
        assert_eq!(canonical_name("My Agent"), "myAgent");
        assert_eq!(canonical_name("MY-AGENT"), "myAgent");
        assert_eq!(canonical_name("agent"), "agent");
    }

    #[test]
    fn leading_digits_are_prefixed() {
        assert_eq!(canonical_name("2fa-helper"), "_2faHelper");
        assert_eq!(type_name("404 page"), "_404Page");
        assert_eq!(canonical_name("---"), "_");
    }

    #[test]
    fn type_names_are_pascal_case() {
        assert_eq!(type_name("my-agent"), "MyAgent");
        assert_eq!(type_name("post /api/users/:id"), "PostApiUsersId");
    }

    #[test]
    fn hyphen_and_underscore_variants_collide() {
        let mut detector = CollisionDetector::new();
        detector
            .register(Origin::new("my-agent", "src/agent/a/agent.ts"))
            .unwrap();
        let err = detector
            .register(Origin::new("my_agent", "src/agent/b/agent.ts"))
            .unwrap_err();

        assert_eq!(err.key, "myAgent");
        assert_eq!(err.first.file, "src/agent/a/agent.ts");
        assert_eq!(err.second.name, "my_agent");
        let message = err.to_string();
        assert!(message.contains("src/agent/a/agent.ts"));
        assert!(message.contains("src/agent/b/agent.ts"));
    }

    #[test]
    fn distinct_names_do_not_collide() {
        let mut detector = CollisionDetector::new();
        assert_eq!(
            detector.register(Origin::new("my-agent", "a.ts")).unwrap(),
            "myAgent"
        );
        assert_eq!(
            detector
                .register(Origin::new("other-agent", "b.ts"))
                .unwrap(),
            "otherAgent"
        );
        assert_eq!(detector.len(), 2);
    }
}
