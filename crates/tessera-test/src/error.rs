//! Test error types.

use thiserror::Error;

/// Errors that can occur while building requests or reading replies.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected exactly one reply.
    #[error("Expected exactly one reply, got {0}")]
    ReplyCount(usize),
}
