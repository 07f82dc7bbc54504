use crate::error::{ParserError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source dialect a declaration file is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    TypeScript,
    Tsx,
    JavaScript,
    Unknown,
}

impl SourceLanguage {
    /// Extensions the scanner considers, without the leading dot
    pub const EXTENSIONS: &'static [&'static str] =
        &["ts", "mts", "cts", "tsx", "js", "mjs", "cjs", "jsx"];

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => SourceLanguage::TypeScript,
            "tsx" => SourceLanguage::Tsx,
            // JSX goes through the TSX grammar, which is a superset
            "jsx" => SourceLanguage::Tsx,
            "js" | "mjs" | "cjs" => SourceLanguage::JavaScript,
            _ => SourceLanguage::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(SourceLanguage::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            SourceLanguage::TypeScript => "typescript",
            SourceLanguage::Tsx => "tsx",
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::Unknown => "unknown",
        }
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            SourceLanguage::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            SourceLanguage::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            SourceLanguage::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            SourceLanguage::Unknown => Err(ParserError::unsupported_language(self.as_str())),
        }
    }
}
