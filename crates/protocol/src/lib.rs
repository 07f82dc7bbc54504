//! Shared data model for agent and route discovery.
//!
//! Every type here is produced fresh by a discovery pass and never persisted
//! between passes. Serialisable types double as the schema of `metadata.json`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub mod naming;
pub mod route_path;

pub use naming::{canonical_name, type_name, CollisionDetector, NameCollision, Origin};
pub use route_path::{
    extract_path_params, join_route_path, parse_path_params, route_type_name, tree_segments,
    PathParam,
};

pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Length of the truncated hex digest used by identity ids.
pub const IDENTITY_HEX_LEN: usize = 32;

pub const AGENT_IDENTITY_PREFIX: &str = "agentid_";
pub const AGENT_CONTENT_PREFIX: &str = "agent_";
pub const EVAL_IDENTITY_PREFIX: &str = "evalid_";
pub const EVAL_CONTENT_PREFIX: &str = "eval_";
pub const ROUTE_IDENTITY_PREFIX: &str = "routeid_";

/// Namespace inputs for identity hashing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceContext {
    pub project_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_scope: Option<String>,
}

impl NamespaceContext {
    pub fn new(project_scope: impl Into<String>, deployment_scope: Option<String>) -> Self {
        Self {
            project_scope: project_scope.into(),
            deployment_scope,
        }
    }

    /// Deployment scope as hashed; absent scopes hash as the empty string.
    #[must_use]
    pub fn deployment_or_empty(&self) -> &str {
        self.deployment_scope.as_deref().unwrap_or("")
    }
}

/// A discovered source file. Read once, never written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative path with `/` separators
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Text in the canonical form used for version hashing: no UTF-8 BOM, LF line endings.
    #[must_use]
    pub fn canonical_text(&self) -> Cow<'_, str> {
        let text = self.text.strip_prefix('\u{feff}').unwrap_or(&self.text);
        if text.contains("\r\n") {
            Cow::Owned(text.replace("\r\n", "\n"))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Content version plus the two identity hashes of a declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub version: String,
    pub identity_id: String,
    pub content_scoped_id: String,
}

/// Schema reference as written, plus what it resolved to inside its file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SchemaExpression {
    pub raw: String,
    pub resolved: String,
}

impl SchemaExpression {
    /// Schema written inline; raw and resolved text are identical.
    pub fn inline(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: text.clone(),
            resolved: text,
        }
    }

    #[must_use]
    pub fn was_substituted(&self) -> bool {
        self.raw != self.resolved
    }
}

/// How a file-local name was introduced by an `import` statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum ImportKind {
    Default,
    Named(String),
    Namespace,
}

/// One local binding created by an `import` statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub struct ImportBinding {
    pub local: String,
    pub kind: ImportKind,
    /// Module specifier exactly as written
    pub source: String,
    pub type_only: bool,
}

impl ImportBinding {
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }
}

/// A module-level name declared in a source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalDeclaration {
    pub name: String,
    /// Self-contained statement that re-declares the name elsewhere;
    /// `None` for bindings that cannot be lifted (destructuring, no initializer).
    pub statement: Option<String>,
}

impl LocalDeclaration {
    pub fn new(name: impl Into<String>, statement: Option<String>) -> Self {
        Self {
            name: name.into(),
            statement,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvalMetadata {
    pub filename: String,
    pub name: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the agent this eval belongs to
    pub agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub filename: String,
    pub name: String,
    /// Collision-checked registry key
    pub canonical_name: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<SchemaExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<SchemaExpression>,
    #[serde(default)]
    pub streaming: bool,
    /// Name of the owning agent for subagents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subagents: Vec<String>,
    #[serde(default)]
    pub evals: Vec<EvalMetadata>,
}

/// HTTP verb or non-HTTP transport a route is served over.
///
/// Declaration order is the sort order used for emission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    WebSocket,
    EventStream,
    Stream,
}

impl RouteKind {
    pub const ALL: [RouteKind; 8] = [
        RouteKind::Get,
        RouteKind::Post,
        RouteKind::Put,
        RouteKind::Patch,
        RouteKind::Delete,
        RouteKind::WebSocket,
        RouteKind::EventStream,
        RouteKind::Stream,
    ];

    /// Map a router method name (`router.<method>(...)`) to a route kind.
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "get" => Some(RouteKind::Get),
            "post" => Some(RouteKind::Post),
            "put" => Some(RouteKind::Put),
            "patch" => Some(RouteKind::Patch),
            "delete" => Some(RouteKind::Delete),
            "websocket" | "ws" => Some(RouteKind::WebSocket),
            "sse" | "eventstream" => Some(RouteKind::EventStream),
            "stream" => Some(RouteKind::Stream),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteKind::Get => "get",
            RouteKind::Post => "post",
            RouteKind::Put => "put",
            RouteKind::Patch => "patch",
            RouteKind::Delete => "delete",
            RouteKind::WebSocket => "websocket",
            RouteKind::EventStream => "eventstream",
            RouteKind::Stream => "stream",
        }
    }

    /// Upper-case HTTP verb, `None` for transport kinds.
    #[must_use]
    pub const fn http_method(self) -> Option<&'static str> {
        match self {
            RouteKind::Get => Some("GET"),
            RouteKind::Post => Some("POST"),
            RouteKind::Put => Some("PUT"),
            RouteKind::Patch => Some("PATCH"),
            RouteKind::Delete => Some("DELETE"),
            RouteKind::WebSocket | RouteKind::EventStream | RouteKind::Stream => None,
        }
    }

    #[must_use]
    pub const fn is_http(self) -> bool {
        self.http_method().is_some()
    }

    /// Kinds whose responses are delivered incrementally.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, RouteKind::EventStream | RouteKind::Stream)
    }

    /// Flat registry key: `"<VERB> <path>"`, or the bare path for transport kinds.
    #[must_use]
    pub fn registry_key(self, path: &str) -> String {
        match self.http_method() {
            Some(verb) => format!("{verb} {path}"),
            None => path.to_string(),
        }
    }

    /// Key of this kind's leaf inside a route tree node.
    #[must_use]
    pub fn leaf_key(self) -> String {
        format!("${}", self.as_str())
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.http_method() {
            Some(verb) => f.write_str(verb),
            None => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetadata {
    pub filename: String,
    pub id: String,
    /// Full path as dispatched, parameter markers intact
    pub path: String,
    pub kind: RouteKind,
    pub version: String,
    /// Route declared a validator
    #[serde(default)]
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<SchemaExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<SchemaExpression>,
    /// Name of the agent whose validator guards this route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default)]
    pub path_params: Vec<String>,
    #[serde(default)]
    pub streaming: bool,
    /// Imports of the declaring file, needed to re-emit schema text elsewhere
    #[serde(skip)]
    #[schemars(skip)]
    pub imports: Vec<ImportBinding>,
    /// Module-level declarations of the declaring file, in source order
    #[serde(skip)]
    #[schemars(skip)]
    pub locals: Vec<LocalDeclaration>,
}

impl RouteMetadata {
    #[must_use]
    pub fn registry_key(&self) -> String {
        self.kind.registry_key(&self.path)
    }

    #[must_use]
    pub fn has_schema(&self) -> bool {
        self.input_schema.is_some() || self.output_schema.is_some()
    }
}

/// Serialisable content of the `metadata.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryManifest {
    pub schema_version: u32,
    #[serde(flatten)]
    pub namespace: NamespaceContext,
    pub agents: Vec<AgentMetadata>,
    pub routes: Vec<RouteMetadata>,
}

/// JSON schema describing `metadata.json`.
#[must_use]
pub fn metadata_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(DiscoveryManifest)).unwrap_or_default()
}
