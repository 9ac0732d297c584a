//! Error types for the zkherd model.

use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while parsing or manipulating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("invalid server id: {0}")]
    InvalidServerId(String),

    #[error("server already exists: {0}")]
    DuplicateServer(String),

    #[error("no suitable port for server {0}")]
    NoSuitablePort(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
