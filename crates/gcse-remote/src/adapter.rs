//! The hosting-provider-agnostic remote surface (`spec.md` §4.3).

use crate::error::RemoteError;
use crate::types::{RepoInfo, TreeEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Operations a crawler needs from a source-hosting provider. A trait so
/// other hosts are pluggable per `spec.md` §1's non-goal; `GithubAdapter` is
/// the one implementation this crate ships.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// List a user's repositories.
    async fn list_user_repos(
        &self,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, RepoInfo>, RemoteError>;

    /// Read a single repository's metadata. `NotFound` on a 404.
    async fn read_repository(
        &self,
        user: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<RepoInfo, RemoteError>;

    /// The SHA of `branch`'s tip commit. `NotFound` on a 404; an empty
    /// string when the branch exists but has no commits.
    async fn repo_branch_sha(
        &self,
        user: &str,
        name: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RemoteError>;

    /// List every entry under `sha`, optionally recursively.
    async fn get_tree(
        &self,
        user: &str,
        name: &str,
        sha: &str,
        recursive: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Non-recursive listing of one directory's immediate entries
    /// (`spec.md` §4.6 step 1), at `path` on `branch`. `path == ""` lists
    /// the repository root.
    async fn list_directory(
        &self,
        user: &str,
        name: &str,
        path: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Fetch a file's raw body. `TooLarge` when the remote rejects the
    /// payload on size grounds.
    async fn get_file(
        &self,
        user: &str,
        name: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RemoteError>;

    /// Search repositories by free-text query. Implementations append a
    /// language filter when the query doesn't already carry one.
    async fn search_repositories(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RepoInfo>, RemoteError>;
}
