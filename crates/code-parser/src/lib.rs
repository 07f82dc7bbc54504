//! # Discovery Parser
//!
//! Tolerant, tree-sitter based extraction of agent, eval and route
//! declarations from TypeScript and JavaScript sources.
//!
//! ## Philosophy
//!
//! Discovery reads source, it never runs it:
//! - Malformed code degrades extraction locally, never the whole file or tree
//! - Only literal, statically visible declarations are recognised
//! - Schema references are resolved inside the declaring file and kept as text
//!
//! ## Architecture
//!
//! ```text
//! SourceFile
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → SyntaxTree
//!     │    └─> Statements recovered from inside ERROR nodes
//!     │
//!     ├──> Scope Resolver
//!     │    ├─> Module-level const/let/var table
//!     │    ├─> Import bindings (opaque)
//!     │    └─> Alias chains, member paths (bounded)
//!     │
//!     └──> Declaration Extractor
//!          ├─> createAgent / createEval (exported)
//!          ├─> router.<method>(path, validator(...))
//!          └─> Emit ExtractedFile with Declaration[]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use discovery_parser::{DeclarationExtractor, FileRole};
//! use discovery_protocol::SourceFile;
//!
//! let source = SourceFile::new(
//!     "src/agent/hello/agent.ts",
//!     "export default createAgent('hello', { description: 'Says hello' });",
//! );
//!
//! let extracted = DeclarationExtractor::default()
//!     .extract(&source, FileRole::Agent)
//!     .unwrap();
//! assert_eq!(extracted.declarations[0].name, "hello");
//! ```

mod config;
mod error;
mod extractor;
mod language;
mod routes;
mod scope;
mod syntax;
mod types;

pub use config::ExtractorConfig;
pub use error::{ParserError, Result};
pub use extractor::DeclarationExtractor;
pub use language::SourceLanguage;
pub use scope::{Resolution, ScopeResolver, MAX_ALIAS_HOPS};
pub use syntax::SyntaxTree;
pub use types::{
    AgentRef, Declaration, DeclarationKind, ExtractedFile, FileRole, RouteDetails, SchemaRefs,
};
