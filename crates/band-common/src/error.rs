/// Error types shared across the researchband crates.
///
/// These errors represent failures in outbound HTTP calls shared by every server crate.
/// Redis failures never surface as errors (see `RedisCache`). Application-specific errors
/// should be defined in each server crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} body={body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },
}
