use discovery_protocol::NameCollision;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parser error: {0}")]
    ParserError(#[from] discovery_parser::ParserError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Collision(#[from] NameCollision),

    #[error("duplicate route '{key}' declared in {first} and {second}")]
    DuplicateRoute {
        key: String,
        first: String,
        second: String,
    },

    #[error("parent agent '{parent}' not found (referenced from {})", .files.join(", "))]
    MissingParent { parent: String, files: Vec<String> },

    #[error("{declaration} in {file} is missing required field '{field}'")]
    MissingField {
        field: String,
        declaration: String,
        file: String,
    },

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl DiscoveryError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn missing_field(
        field: impl Into<String>,
        declaration: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self::MissingField {
            field: field.into(),
            declaration: declaration.into(),
            file: file.into(),
        }
    }

    /// Whether the error stems from the discovered sources rather than the environment
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Collision(_)
                | Self::DuplicateRoute { .. }
                | Self::MissingParent { .. }
                | Self::MissingField { .. }
        )
    }
}
