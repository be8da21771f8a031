//! Single-package crawl: ties the Package Fetcher (C6) to the crawl store,
//! folder discovery, and document persistence. Used both by the `--pkg`
//! single-item CLI path and the package worker pool (`spec.md` §5, §6.3,
//! `original_source/cmd/gcse-crawler/main.go`'s `CrawlPackage` call site).

use crate::fetcher::{build_package, files_in_dir, synopsis};
use gcse_core::{DocInfo, Error, Millis, NewDocAction, PackagePath, Result, Site};
use gcse_filecache::FileCache;
use gcse_remote::RemoteAdapter;
use gcse_store::CrawlStore;
use tokio_util::sync::CancellationToken;

/// The package re-crawl interval absent any other schedule pressure
/// (`spec.md` §9 leaves this undefined for packages, unlike the person
/// re-crawl age; recorded as an Open Question resolution in `DESIGN.md`).
const PACKAGE_RECRAWL_HOURS: i64 = 24;

/// Crawl one package end to end: fetch its repository metadata, list its
/// directory, build the merged package contents, and persist the result.
///
/// Subdirectories are appended to the crawl store's package queue even if
/// building this package's own contents fails, per `spec.md` §4.6's
/// "folders list... returned even on partial failure so callers can
/// enqueue them."
///
/// On success, produces an `Action::Update` and reschedules the package
/// `PACKAGE_RECRAWL_HOURS` out. On failure, reschedules
/// `gcse_core::FAILURE_RETRY_DELAY_HOURS` out and returns the error.
///
/// # Errors
/// Returns [`Error::InvalidPackage`] or a remote-adapter error translated
/// via [`gcse_remote::into_invalid_repository`]/[`gcse_remote::into_file_error`].
pub async fn crawl_package(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    store: &CrawlStore,
    path: &PackagePath,
    cancel: &CancellationToken,
) -> Result<NewDocAction> {
    let Some((site, user, repo, sub)) = path.parts() else {
        return Err(Error::InvalidPackage {
            path: path.as_str().to_string(),
            reason: "malformed package path".to_string(),
        });
    };
    let site = Site::new(site);

    let result = crawl_inner(remote, cache, store, &site, user, repo, sub, path, cancel).await;

    match &result {
        Ok(_) => {
            let now = Millis::now();
            store.record_package_crawl(
                path,
                now.plus(chrono::Duration::hours(PACKAGE_RECRAWL_HOURS)),
                now,
            )?;
        }
        Err(_) => {
            store.schedule_package(
                path,
                Millis::now().plus(chrono::Duration::hours(gcse_core::FAILURE_RETRY_DELAY_HOURS)),
            )?;
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn crawl_inner(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    store: &CrawlStore,
    site: &Site,
    user: &str,
    repo: &str,
    sub: &str,
    path: &PackagePath,
    cancel: &CancellationToken,
) -> Result<NewDocAction> {
    let repo_info = remote
        .read_repository(user, repo, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, user, repo))?;

    let entries = remote
        .list_directory(user, repo, sub, &repo_info.default_branch, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, user, repo))?;

    for entry in &entries {
        if entry.kind == gcse_remote::EntryKind::Tree {
            let sub_path = PackagePath::new(site, user, repo, &entry.path);
            store.append_package(&sub_path)?;
        }
    }

    let files = files_in_dir(&entries, sub);
    let contents = build_package(remote, cache, user, repo, sub, &files, cancel).await?;

    let doc = DocInfo {
        name: contents.name,
        synopsis: synopsis(&contents.description),
        description: contents.description,
        readme_fn: contents.readme_fn,
        readme_data: contents.readme_data,
        imports: contents.imports,
        test_imports: contents.test_imports,
        imported_by: Vec::new(),
        stars: repo_info.stars,
        last_crawl: Millis::now(),
        source: site.clone(),
    };

    store.put_document(path, &doc)?;
    Ok(NewDocAction::update(path.clone(), doc))
}
