use crate::language::SourceLanguage;
use discovery_protocol::{ImportBinding, LocalDeclaration, RouteKind, SchemaExpression};
use serde::{Deserialize, Serialize};

/// What a scanned file is expected to declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Agent,
    Eval,
    Route,
}

impl FileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FileRole::Agent => "agent",
            FileRole::Eval => "eval",
            FileRole::Route => "route",
        }
    }
}

/// Kind of a recognised declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Agent,
    Eval,
    Route,
}

/// Reference from one declaration to an agent declared elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRef {
    /// Agent name or `agentid_` identity, as a literal
    Name(String),
    /// Default import of an agent module; holds the specifier as written
    Module(String),
}

/// `schema: { input, output, stream }` of a config object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRefs {
    pub input: Option<SchemaExpression>,
    pub output: Option<SchemaExpression>,
    pub stream: bool,
}

impl SchemaRefs {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }
}

/// Route specifics of a `router.<method>(path, ...)` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDetails {
    pub kind: RouteKind,
    /// A `validator(...)` argument was present
    pub validated: bool,
    /// Agent whose validator guards the route
    pub agent: Option<AgentRef>,
}

/// A recognised declaration with its extracted config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Name literal; for routes, the path literal as written
    pub name: String,
    /// Config argument source text (validator call for routes)
    pub config: String,
    /// Root-relative path of the declaring file
    pub file: String,
    /// 1-indexed line of the factory call
    pub line: usize,
    pub description: Option<String>,
    pub schema: SchemaRefs,
    /// Declared parent of a subagent
    pub parent: Option<AgentRef>,
    /// Agent an eval was created on (`agent.createEval(...)`)
    pub owner: Option<AgentRef>,
    pub route: Option<RouteDetails>,
}

impl Declaration {
    pub(crate) fn new(kind: DeclarationKind, name: String, file: &str, line: usize) -> Self {
        Self {
            kind,
            name,
            config: String::new(),
            file: file.to_string(),
            line,
            description: None,
            schema: SchemaRefs::default(),
            parent: None,
            owner: None,
            route: None,
        }
    }
}

/// Everything extracted from one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub path: String,
    pub role: FileRole,
    pub language: SourceLanguage,
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportBinding>,
    pub locals: Vec<LocalDeclaration>,
    /// The syntax tree contained error nodes
    pub has_syntax_errors: bool,
    /// Declarations dropped for a reason worth surfacing
    pub diagnostics: Vec<String>,
}

impl ExtractedFile {
    pub fn of_kind(&self, kind: DeclarationKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }
}
