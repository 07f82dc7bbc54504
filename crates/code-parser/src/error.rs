use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while turning source text into declarations
#[derive(Error, Debug)]
pub enum ParserError {
    /// File extension has no grammar
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Tree-sitter refused the grammar or produced no tree
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl ParserError {
    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
