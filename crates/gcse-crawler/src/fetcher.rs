//! Shared per-file fetch/cache/parse logic used by both the Package
//! Fetcher (C6) and the Repo Walker (C7) (`spec.md` §4.6–§4.7).

use crate::parse::{parse_source, ParseOutcome};
use gcse_core::{CachedFile, FileStatus};
use gcse_filecache::FileCache;
use gcse_remote::{RemoteAdapter, TreeEntry};
use tokio_util::sync::CancellationToken;

/// One non-directory file discovered under a package directory.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Path relative to the repository root.
    pub repo_path: String,
    /// Bare filename (no directory component).
    pub name: String,
    /// Blob SHA, used as the file cache key.
    pub sha: String,
}

/// `entries` restricted to the blobs directly inside `dir` (no further `/`
/// after stripping the `dir/` prefix).
#[must_use]
pub fn files_in_dir(entries: &[TreeEntry], dir: &str) -> Vec<CandidateFile> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    };
    entries
        .iter()
        .filter(|e| e.kind == gcse_remote::EntryKind::Blob)
        .filter_map(|e| {
            let rest = e.path.strip_prefix(&prefix)?;
            if rest.is_empty() || rest.contains('/') {
                return None;
            }
            Some(CandidateFile {
                repo_path: e.path.clone(),
                name: rest.to_string(),
                sha: e.sha.clone(),
            })
        })
        .collect()
}

/// True if `filename` (no extension stripped) looks like a README, per
/// `spec.md` §4.6: a case-insensitive stem match, ignoring extension.
#[must_use]
pub fn is_readme(filename: &str) -> bool {
    let stem = filename.split('.').next().unwrap_or(filename);
    stem.eq_ignore_ascii_case("readme")
}

/// The outcome of processing one `.go` file: either a parsed result (cache
/// hit or fresh fetch+parse) or a reason it was skipped.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Parsed successfully, with file contents carried through so the
    /// caller can also check for documentation.
    Parsed(CachedFile),
    /// Skipped: non-Go file, build-tag excluded, or a test-file parse
    /// failure.
    Ignored,
    /// A parse failure on a non-test file: the whole package is invalid.
    Failed,
}

/// Fetch-or-reuse-from-cache and parse a single file (`spec.md` §4.1, §4.6,
/// P4: a cache hit is authoritative and skips the remote fetch entirely).
///
/// # Errors
/// Propagates remote-adapter errors other than `TooLarge`, which is
/// folded into `FileOutcome::Ignored` instead of failing the caller.
pub async fn process_file(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    user: &str,
    repo: &str,
    file: &CandidateFile,
    cancel: &CancellationToken,
) -> gcse_core::Result<FileOutcome> {
    if !file.name.ends_with(".go") {
        return Ok(FileOutcome::Ignored);
    }

    let blob_hash = file.sha.as_bytes();
    if let Some(cached) = cache.get(blob_hash)? {
        cache.inc_counter("filecache_hit");
        return Ok(outcome_for(cached));
    }
    cache.inc_counter("filecache_miss");

    let body = match remote.get_file(user, repo, &file.repo_path, cancel).await {
        Ok(body) => body,
        Err(gcse_remote::RemoteError::TooLarge) => {
            let cached = CachedFile::should_ignore();
            cache.set(blob_hash, &cached)?;
            return Ok(FileOutcome::Ignored);
        }
        Err(err) => return Err(gcse_remote::into_file_error(err, &file.repo_path)),
    };

    let cached = match parse_source(&file.name, &body) {
        ParseOutcome::Success(parsed) => CachedFile {
            status: Some(FileStatus::ParseSuccess),
            package_name: parsed.package_name,
            imports: parsed.imports,
            is_test: file.name.ends_with("_test.go"),
            doc_comment: parsed.doc_comment,
        },
        ParseOutcome::ShouldIgnore => CachedFile::should_ignore(),
        ParseOutcome::Failed => CachedFile::parse_failed(),
    };
    cache.set(blob_hash, &cached)?;
    Ok(outcome_for(cached))
}

fn outcome_for(cached: CachedFile) -> FileOutcome {
    match cached.status {
        Some(FileStatus::ParseSuccess) => FileOutcome::Parsed(cached),
        Some(FileStatus::ShouldIgnore) | None => FileOutcome::Ignored,
        Some(FileStatus::ParseFailed) => FileOutcome::Failed,
    }
}

/// Everything gathered about one package directory's files (`spec.md`
/// §4.6 steps 3–4), before the caller wraps it in a [`gcse_core::DocInfo`].
#[derive(Debug, Clone, Default)]
pub struct PackageContents {
    /// Declared package name, common across all non-test files.
    pub name: String,
    /// Non-test imports, merged across files.
    pub imports: Vec<String>,
    /// Test-only imports, merged across files.
    pub test_imports: Vec<String>,
    /// Full description: leading doc comment of whichever file carried one.
    pub description: String,
    /// README filename, if a README was found in this directory.
    pub readme_fn: String,
    /// README body.
    pub readme_data: String,
}

/// Fetch, cache, and parse every `.go` file in `files` (a single
/// directory's listing), merging their results per `spec.md` §4.6 steps
/// 3–5. The README, if any, is fetched too.
///
/// # Errors
/// Returns [`gcse_core::Error::InvalidPackage`] if a non-test file fails to
/// parse, or if non-test files disagree on (or omit) a package name.
pub async fn build_package(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    user: &str,
    repo: &str,
    dir: &str,
    files: &[CandidateFile],
    cancel: &CancellationToken,
) -> gcse_core::Result<PackageContents> {
    let mut contents = PackageContents::default();

    for file in files {
        if is_readme(&file.name) {
            match remote.get_file(user, repo, &file.repo_path, cancel).await {
                Ok(body) => {
                    contents.readme_fn = file.name.clone();
                    contents.readme_data = body;
                }
                Err(gcse_remote::RemoteError::TooLarge) => {}
                Err(err) => return Err(gcse_remote::into_file_error(err, &file.repo_path)),
            }
            continue;
        }

        match process_file(remote, cache, user, repo, file, cancel).await? {
            FileOutcome::Ignored => continue,
            FileOutcome::Failed => {
                return Err(gcse_core::Error::InvalidPackage {
                    path: dir.to_string(),
                    reason: format!("{} failed to parse", file.repo_path),
                })
            }
            FileOutcome::Parsed(cached) => {
                if cached.package_name.is_empty() {
                    continue;
                }
                if contents.name.is_empty() {
                    contents.name = cached.package_name.clone();
                } else if contents.name != cached.package_name {
                    return Err(gcse_core::Error::InvalidPackage {
                        path: dir.to_string(),
                        reason: format!(
                            "conflicting package names {} and {}",
                            contents.name, cached.package_name
                        ),
                    });
                }
                if !cached.doc_comment.is_empty() && contents.description.is_empty() {
                    contents.description = cached.doc_comment;
                }
                if cached.is_test {
                    contents.test_imports.extend(cached.imports);
                } else {
                    contents.imports.extend(cached.imports);
                }
            }
        }
    }

    if contents.name.is_empty() {
        return Err(gcse_core::Error::InvalidPackage {
            path: dir.to_string(),
            reason: "no non-test file declared a package name".to_string(),
        });
    }

    contents.imports.sort();
    contents.imports.dedup();
    contents.test_imports.sort();
    contents.test_imports.dedup();

    Ok(contents)
}

/// The one-line synopsis: the leading doc comment's first sentence
/// (`spec.md` §3's `DocInfo.synopsis`).
#[must_use]
pub fn synopsis(description: &str) -> String {
    let first_line = description.lines().next().unwrap_or("").trim();
    match first_line.find(". ") {
        Some(idx) => first_line[..=idx].trim_end().to_string(),
        None => first_line.trim_end_matches('.').to_string() + if first_line.is_empty() { "" } else { "." },
    }
}
