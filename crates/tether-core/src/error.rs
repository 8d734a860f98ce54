//! The caller-facing error taxonomy.
//!
//! Every operation surfaces one of four kinds. Toggle and stats calls
//! propagate them to the caller unchanged; the lifecycle hook and the
//! reconciler log them and wait for the next trigger instead.

use thiserror::Error;

/// Errors surfaced by follow operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FollowError {
    /// Caller identity missing where one is required.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The request itself is malformed: missing target id, self-follow,
    /// missing user id. Retrying with the same input cannot succeed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced user record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store could not commit, or something else unexpected broke.
    /// The mutation was not applied; retrying is safe.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FollowError {
    /// Whether a client may retry the same request and expect progress.
    ///
    /// Toggle is idempotent on edge identity, so `Internal` failures are
    /// safe to re-issue. The other kinds are deterministic rejections.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
