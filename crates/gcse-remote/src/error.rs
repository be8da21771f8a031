//! Remote-call error classification (`spec.md` §4.3: "Errors are classified
//! into `NotFound`, `TooLarge`, `RateLimited`, and `Other`; only the first
//! two are non-retryable at the call site.").

use gcse_core::Error as CoreError;
use thiserror::Error;

/// Error surfaced by a [`crate::RemoteAdapter`] call, before it is folded
/// into [`gcse_core::Error`] at the caller.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The requested object does not exist remotely.
    #[error("not found")]
    NotFound,

    /// The remote rejected the payload because it was too large to return.
    #[error("payload too large")]
    TooLarge,

    /// The remote's quota is currently exhausted. The rate governor should
    /// already prevent most of these; a caller that bypasses it (or hits a
    /// race) sees this instead of a silent hang.
    #[error("rate limited")]
    RateLimited,

    /// Network transport failure, unexpected status code, or malformed
    /// response body. Retryable.
    #[error("remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Classify an HTTP status code and optional GitHub error body into a
    /// [`RemoteError`], matching `original_source/spider/github/github.go`'s
    /// `isNotFound`/`isTooLargeError` (but via typed status/body inspection
    /// rather than string matching on the Go client's error type).
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status {
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::TOO_MANY_REQUESTS => {
                if body.contains("\"too_large\"") {
                    Self::TooLarge
                } else {
                    Self::RateLimited
                }
            }
            reqwest::StatusCode::UNPROCESSABLE_ENTITY if body.contains("\"too_large\"") => {
                Self::TooLarge
            }
            status => Self::Other(format!("unexpected status {status}")),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(format!("decode error: {err}"))
    }
}

/// Fold a [`RemoteError`] into the crate-wide [`CoreError`] taxonomy, given
/// the repository/package context the call was made for.
#[must_use]
pub fn into_invalid_repository(err: RemoteError, user: &str, name: &str) -> CoreError {
    match err {
        RemoteError::NotFound => CoreError::InvalidRepository {
            user: user.to_string(),
            name: name.to_string(),
            reason: "repository not found".to_string(),
        },
        RemoteError::TooLarge => CoreError::TooLarge {
            path: format!("{user}/{name}"),
        },
        RemoteError::RateLimited => CoreError::RateLimited,
        RemoteError::Other(msg) => CoreError::Transient(msg),
    }
}

/// Fold a [`RemoteError`] for a file fetch at `path` into [`CoreError`].
#[must_use]
pub fn into_file_error(err: RemoteError, path: &str) -> CoreError {
    match err {
        RemoteError::NotFound => CoreError::NotFound {
            kind: "file",
            id: path.to_string(),
        },
        RemoteError::TooLarge => CoreError::TooLarge {
            path: path.to_string(),
        },
        RemoteError::RateLimited => CoreError::RateLimited,
        RemoteError::Other(msg) => CoreError::Transient(msg),
    }
}
