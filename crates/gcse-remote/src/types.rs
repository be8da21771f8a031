//! Remote-adapter value types (`spec.md` §4.3).

use serde::{Deserialize, Serialize};

/// Repository metadata returned by `ListUserRepos`/`ReadRepository`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Repository description, if set.
    pub description: String,
    /// Star count.
    pub stars: u32,
    /// Last push/update time, RFC3339.
    pub last_updated: String,
    /// Default branch name.
    pub default_branch: String,
    /// Upstream fork source, if this repo is a fork.
    pub source: String,
}

/// An entry in a `GetTree` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Whether this is a file (`Blob`) or a directory (`Tree`).
    pub kind: EntryKind,
    /// Blob or tree SHA, used as the file cache key for blobs.
    pub sha: String,
}

/// The kind of a [`TreeEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// A file.
    Blob,
    /// A directory.
    Tree,
}
