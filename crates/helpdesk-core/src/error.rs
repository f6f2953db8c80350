use thiserror::Error;

/// Top-level error type for the Helpdesk system.
///
/// Subsystem crates define their own error types and convert from this one
/// so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelpdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for HelpdeskError {
    fn from(err: toml::de::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HelpdeskError {
    fn from(err: toml::ser::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(err: serde_json::Error) -> Self {
        HelpdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Helpdesk operations.
pub type Result<T> = std::result::Result<T, HelpdeskError>;
