use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("route tree conflict at '{node}' ({leaf}): '{first}' and '{second}' declare the same route")]
    TreeConflict {
        node: String,
        leaf: String,
        first: String,
        second: String,
    },

    #[error("import '{local}' is bound differently by {first} and {second}")]
    ImportConflict {
        local: String,
        first: String,
        second: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
