//! The Repo Walker (C7, `spec.md` §4.7): one recursive tree fetch, grouped
//! by directory, sharing per-file logic with the Package Fetcher via
//! [`crate::fetcher::build_package`].

use crate::fetcher::{build_package, files_in_dir, PackageContents};
use gcse_core::{Repository, Result};
use gcse_filecache::FileCache;
use gcse_remote::RemoteAdapter;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// One package directory discovered while walking a repository.
#[derive(Debug, Clone)]
pub struct WalkedPackage {
    /// In-repository directory path (empty for the repository root).
    pub dir: String,
    /// The merged file contents for that directory.
    pub contents: PackageContents,
}

/// Walk `user/repo`'s default branch tree at `tree_sha`, yielding every
/// package directory via `on_package`. Skips the walk entirely (returns
/// `Ok(vec![])`) if `repo.is_fresh(tree_sha)` (`spec.md` §4.7).
///
/// Directories whose package build fails with `InvalidPackage` are
/// reported to `on_invalid` rather than aborting the whole walk, since one
/// bad package in a large repository should not block the rest
/// (`spec.md` §4.7's "yields each package via a callback").
///
/// # Errors
/// Propagates a remote error from the single `get_tree` call.
pub async fn walk_repository(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    user: &str,
    repo: &str,
    tree_sha: &str,
    existing: &Repository,
    cancel: &CancellationToken,
    mut on_package: impl FnMut(WalkedPackage),
    mut on_invalid: impl FnMut(String, gcse_core::Error),
) -> Result<()> {
    if existing.is_fresh(tree_sha) {
        return Ok(());
    }

    let entries = remote
        .get_tree(user, repo, tree_sha, true, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, user, repo))?;

    let mut dirs: BTreeMap<String, ()> = BTreeMap::new();
    dirs.insert(String::new(), ());
    for entry in &entries {
        if entry.kind == gcse_remote::EntryKind::Tree {
            dirs.insert(entry.path.clone(), ());
        } else if let Some((dir, _)) = entry.path.rsplit_once('/') {
            dirs.insert(dir.to_string(), ());
        }
    }

    for dir in dirs.keys() {
        let files = files_in_dir(&entries, dir);
        if files.is_empty() {
            continue;
        }
        match build_package(remote, cache, user, repo, dir, &files, cancel).await {
            Ok(contents) => on_package(WalkedPackage {
                dir: dir.clone(),
                contents,
            }),
            Err(err) => on_invalid(dir.clone(), err),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gcse_remote::{EntryKind, RemoteError, RepoInfo, TreeEntry};
    use std::collections::HashMap;

    #[test]
    fn fresh_repository_short_circuits() {
        let mut repo = Repository::default();
        repo.signature = "sha1".to_string();
        assert!(repo.is_fresh("sha1"));
        assert!(!repo.is_fresh("sha2"));
    }

    struct StubRemote {
        tree: Vec<TreeEntry>,
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl RemoteAdapter for StubRemote {
        async fn list_user_repos(
            &self,
            _u: &str,
            _c: &CancellationToken,
        ) -> Result<HashMap<String, RepoInfo>, RemoteError> {
            Ok(HashMap::new())
        }
        async fn read_repository(
            &self,
            _u: &str,
            _n: &str,
            _c: &CancellationToken,
        ) -> Result<RepoInfo, RemoteError> {
            Ok(RepoInfo::default())
        }
        async fn repo_branch_sha(
            &self,
            _u: &str,
            _n: &str,
            _b: &str,
            _c: &CancellationToken,
        ) -> Result<String, RemoteError> {
            Ok(String::new())
        }
        async fn get_tree(
            &self,
            _u: &str,
            _n: &str,
            _sha: &str,
            _recursive: bool,
            _c: &CancellationToken,
        ) -> Result<Vec<TreeEntry>, RemoteError> {
            Ok(self.tree.clone())
        }
        async fn list_directory(
            &self,
            _u: &str,
            _n: &str,
            _p: &str,
            _b: &str,
            _c: &CancellationToken,
        ) -> Result<Vec<TreeEntry>, RemoteError> {
            Ok(Vec::new())
        }
        async fn get_file(
            &self,
            _u: &str,
            _n: &str,
            path: &str,
            _c: &CancellationToken,
        ) -> Result<String, RemoteError> {
            self.files.get(path).cloned().ok_or(RemoteError::NotFound)
        }
        async fn search_repositories(
            &self,
            _q: &str,
            _c: &CancellationToken,
        ) -> Result<Vec<RepoInfo>, RemoteError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn walk_groups_by_directory_and_reports_invalid() {
        let tree = vec![
            TreeEntry {
                path: "http".to_string(),
                kind: EntryKind::Tree,
                sha: "t1".to_string(),
            },
            TreeEntry {
                path: "http/client.go".to_string(),
                kind: EntryKind::Blob,
                sha: "b1".to_string(),
            },
            TreeEntry {
                path: "bad".to_string(),
                kind: EntryKind::Tree,
                sha: "t2".to_string(),
            },
            TreeEntry {
                path: "bad/a.go".to_string(),
                kind: EntryKind::Blob,
                sha: "b2".to_string(),
            },
            TreeEntry {
                path: "bad/b.go".to_string(),
                kind: EntryKind::Blob,
                sha: "b3".to_string(),
            },
        ];
        let mut files = HashMap::new();
        files.insert("http/client.go".to_string(), "package http\n".to_string());
        files.insert("bad/a.go".to_string(), "package a\n".to_string());
        files.insert("bad/b.go".to_string(), "package b\n".to_string());
        let remote = StubRemote { tree, files };

        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let cache = FileCache::open(&db).unwrap();
        let cancel = CancellationToken::new();
        let existing = Repository::default();

        let mut packages = Vec::new();
        let mut invalid = Vec::new();
        walk_repository(
            &remote,
            &cache,
            "u",
            "r",
            "sha1",
            &existing,
            &cancel,
            |p| packages.push(p.dir),
            |dir, _err| invalid.push(dir),
        )
        .await
        .unwrap();

        assert_eq!(packages, vec!["http".to_string()]);
        assert_eq!(invalid, vec!["bad".to_string()]);
    }

    #[tokio::test]
    async fn walk_skips_fresh_repository() {
        let remote = StubRemote {
            tree: Vec::new(),
            files: HashMap::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let cache = FileCache::open(&db).unwrap();
        let cancel = CancellationToken::new();
        let mut existing = Repository::default();
        existing.signature = "sha1".to_string();

        let mut calls = 0;
        walk_repository(
            &remote,
            &cache,
            "u",
            "r",
            "sha1",
            &existing,
            &cancel,
            |_| calls += 1,
            |_, _| calls += 1,
        )
        .await
        .unwrap();
        assert_eq!(calls, 0);
    }
}
