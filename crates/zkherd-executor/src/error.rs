//! Executor error types.

use thiserror::Error;

/// Result type alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors that can occur while driving the supervised process.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("task payload has no usable port option")]
    MissingPort,

    #[error("payload error: {0}")]
    Payload(#[from] zkherd_model::ModelError),

    #[error("supervisor process error: {0}")]
    Process(#[from] std::io::Error),

    #[error("supervisor http error: {0}")]
    Http(#[from] reqwest::Error),
}
