//! The crate-wide error taxonomy (`spec.md` §7).

use std::path::PathBuf;
use thiserror::Error;

/// Errors shared across every `gcse-*` crate.
///
/// The taxonomy mirrors `spec.md` §7: only [`Error::NotFound`] and
/// [`Error::TooLarge`] are non-retryable at the call site, [`Error::RateLimited`]
/// is always absorbed by the rate governor and never surfaces to a caller,
/// and [`Error::Transient`] means "reschedule and try again later."
#[derive(Error, Debug)]
pub enum Error {
    /// The remote provider's quota is exhausted. Callers should never see
    /// this directly; the rate governor suspends instead of returning it,
    /// but it exists so call sites that bypass the governor (tests, single
    /// item CLI runs) can still observe and handle it.
    #[error("rate limited by remote provider")]
    RateLimited,

    /// A remote object does not exist (HTTP 404), or a local record keyed
    /// by it should be treated as gone.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of thing was missing (`"repository"`, `"package"`, ...).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The remote rejected a file fetch because the payload was too large.
    #[error("file too large to fetch: {path}")]
    TooLarge {
        /// Path of the oversized file.
        path: String,
    },

    /// A parsed package had no files agreeing on a package name, or
    /// conflicting file names were found in the same directory.
    #[error("invalid package at {path}: {reason}")]
    InvalidPackage {
        /// Directory path of the offending package.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A repository does not exist, or its branch has no commits.
    #[error("invalid repository {user}/{name}: {reason}")]
    InvalidRepository {
        /// Repository owner.
        user: String,
        /// Repository name.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Network or server error that should be retried later
    /// (`spec.md` §7 `Transient`).
    #[error("transient error: {0}")]
    Transient(String),

    /// The calling context was cancelled (run deadline fired).
    #[error("operation cancelled")]
    Cancelled,

    /// Unrecoverable error: abort the process, operator intervention needed.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Durable-store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem I/O failure with path context.
    #[error("io error at {path}: {message}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying message.
        message: String,
    },

    /// (De)serialization failure for a persisted record.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration could not be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::Io`] with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True if this error should never be retried (`spec.md` §7).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::TooLarge { .. } | Self::InvalidPackage { .. }
        )
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Result type used throughout `gcse-*`.
pub type Result<T> = std::result::Result<T, Error>;
