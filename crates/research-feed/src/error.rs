use std::time::Duration;

use band_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("retrieval failed for '{path}': {message}")]
    Retrieval { path: String, message: String },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid repository '{0}': expected owner/repo")]
    InvalidRepository(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// Failure of a single publish backend. Reported per backend, never escalated.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("no response within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("malformed response: {0}")]
    Malformed(String),
}
