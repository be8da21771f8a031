//! Top-level scheduled-crawl orchestration (`spec.md` §5, §6.3's no-flags
//! path): groups due packages/persons per site under the scheduler's (C5)
//! per-site budget, runs the package pool, the person pool, and a third
//! pool (one partition per known site) driving the repo-walker variant
//! (C7), then folds the run's new-document actions through the merge
//! stage (C8) against the store's existing document set.

use crate::fetcher::synopsis;
use crate::merge::merge;
use crate::scheduler::{select_top_n, Candidate};
use crate::walker::{walk_repository, WalkedPackage};
use crate::{crawl_package, crawl_person, run_pool};
use gcse_core::{DocInfo, Error, Millis, NewDocAction, PackagePath, PersonId, Repository, Site};
use gcse_filecache::FileCache;
use gcse_remote::RemoteAdapter;
use gcse_store::CrawlStore;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tunables for one scheduled-crawl run, matching `spec.md` §6.5's
/// `[crawler]` table.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `AppStopTime = now + due_per_run` (`spec.md` §4.5, §5).
    pub due_per_run: Duration,
    /// Sites excluded from this run entirely.
    pub noncrawl_hosts: Vec<String>,
    /// Partition count for the package worker pool.
    pub package_partitions: usize,
    /// Partition count for the person worker pool.
    pub person_partitions: usize,
    /// Per-site cap on items selected this run (`spec.md` §4.5 `maxCrawl`).
    pub max_crawl_per_site: usize,
}

/// What a scheduled-crawl run produced: every item that failed in any
/// pool, paired with its error.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Packages that failed to crawl this run.
    pub package_errors: Vec<(PackagePath, Error)>,
    /// Persons that failed to crawl this run.
    pub person_errors: Vec<(PersonId, Error)>,
    /// Repositories whose walk failed this run.
    pub repository_errors: Vec<(RepoTask, Error)>,
}

impl RunOutcome {
    /// `spec.md` §6's "non-zero if any pool returned an error."
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.package_errors.is_empty()
            && self.person_errors.is_empty()
            && self.repository_errors.is_empty()
    }
}

/// One known repository due for a walk, grouped by site so that every
/// repository of a given site lands in the same `run_pool` partition
/// (`spec.md` §5's "a third `JoinSet`, one task per known site, drives the
/// repo-walker variant").
#[derive(Debug, Clone)]
pub struct RepoTask {
    site: Site,
    user: String,
    name: String,
    existing: Repository,
}

/// Run one full scheduled crawl: both worker pools, bounded by the deadline
/// and cancellation token, followed by the merge fold.
///
/// # Errors
/// Returns an error only if the document set cannot be read back from the
/// store for the merge fold; individual item failures are collected into
/// the returned [`RunOutcome`] instead of aborting the run.
pub async fn run_scheduled_crawl(
    remote: Arc<dyn RemoteAdapter>,
    cache: &FileCache,
    store: &CrawlStore,
    config: &RunConfig,
    cancel: CancellationToken,
) -> gcse_core::Result<RunOutcome> {
    let now = Millis::now();
    let deadline = Instant::now() + config.due_per_run;

    let packages = due_packages(store, now, &config.noncrawl_hosts, config.max_crawl_per_site)?;
    let persons = due_persons(store, now, &config.noncrawl_hosts, config.max_crawl_per_site)?;
    let repositories = due_repositories(store, &config.noncrawl_hosts)?;
    let repository_partitions = repositories
        .iter()
        .map(|t| t.site.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
        .max(1);

    info!(
        packages = packages.len(),
        persons = persons.len(),
        repositories = repositories.len(),
        "starting scheduled crawl"
    );

    let actions: Arc<Mutex<Vec<NewDocAction>>> = Arc::new(Mutex::new(Vec::new()));

    let package_errors = {
        let remote = Arc::clone(&remote);
        let cache = cache.clone();
        let store = store.clone();
        let cancel = cancel.clone();
        let actions = Arc::clone(&actions);
        run_pool(
            packages,
            config.package_partitions,
            |p: &PackagePath| hash_key(p.as_str()),
            deadline,
            cancel.clone(),
            move |path: PackagePath| {
                let remote = Arc::clone(&remote);
                let cache = cache.clone();
                let store = store.clone();
                let cancel = cancel.clone();
                let actions = Arc::clone(&actions);
                async move {
                    let action =
                        crawl_package(remote.as_ref(), &cache, &store, &path, &cancel).await?;
                    actions.lock().unwrap().push(action);
                    Ok(())
                }
            },
        )
        .await
    };

    let person_errors = {
        let remote = Arc::clone(&remote);
        let store = store.clone();
        let cancel = cancel.clone();
        run_pool(
            persons,
            config.person_partitions,
            |id: &PersonId| hash_key(id.as_str()),
            deadline,
            cancel,
            move |id: PersonId| {
                let remote = Arc::clone(&remote);
                let store = store.clone();
                let cancel = cancel.clone();
                async move {
                    let Some((site, username)) = id.parts() else {
                        return Err(Error::NotFound {
                            kind: "person",
                            id: id.as_str().to_string(),
                        });
                    };
                    let site = gcse_core::Site::new(site);
                    crawl_person(remote.as_ref(), &store, &site, username, &cancel).await?;
                    Ok(())
                }
            },
        )
        .await
    };

    let repository_errors = {
        let remote = Arc::clone(&remote);
        let cache = cache.clone();
        let store = store.clone();
        let cancel = cancel.clone();
        let actions = Arc::clone(&actions);
        run_pool(
            repositories,
            repository_partitions,
            |t: &RepoTask| hash_key(t.site.as_str()),
            deadline,
            cancel.clone(),
            move |task: RepoTask| {
                let remote = Arc::clone(&remote);
                let cache = cache.clone();
                let store = store.clone();
                let cancel = cancel.clone();
                let actions = Arc::clone(&actions);
                async move {
                    walk_one_repository(remote.as_ref(), &cache, &store, &actions, task, &cancel)
                        .await
                }
            },
        )
        .await
    };

    let actions = Arc::try_unwrap(actions)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();

    let mut old_documents = BTreeMap::new();
    store.for_each_document(|path, doc| {
        old_documents.insert(path.clone(), doc.clone());
    })?;

    let (folded, sorted_actions) = merge(&old_documents, actions);
    for entry in &sorted_actions {
        match entry.action {
            gcse_core::Action::Del => store.delete_document(&entry.path)?,
            gcse_core::Action::Original => {}
            gcse_core::Action::Update | gcse_core::Action::Stars => {
                if let Some(doc) = folded.get(&entry.path) {
                    store.put_document(&entry.path, doc)?;
                }
            }
        }
    }
    info!(
        folded_documents = folded.len(),
        actions = sorted_actions.len(),
        "scheduled crawl complete"
    );

    Ok(RunOutcome {
        package_errors,
        person_errors,
        repository_errors,
    })
}

/// Walk one repository's default branch, persist every package directory
/// it yields as a `NewDocAction::Update`, and record the new tree
/// signature (`spec.md` §4.7, §4.4).
///
/// Per-package failures within the walk are logged and skipped rather
/// than failing the whole repository, matching [`walk_repository`]'s own
/// "one bad package shouldn't block the rest" behavior.
async fn walk_one_repository(
    remote: &dyn RemoteAdapter,
    cache: &FileCache,
    store: &CrawlStore,
    actions: &Mutex<Vec<NewDocAction>>,
    task: RepoTask,
    cancel: &CancellationToken,
) -> gcse_core::Result<()> {
    let repo_info = remote
        .read_repository(&task.user, &task.name, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, &task.user, &task.name))?;

    let branch = if task.existing.branch.is_empty() {
        repo_info.default_branch.clone()
    } else {
        task.existing.branch.clone()
    };

    let sha = remote
        .repo_branch_sha(&task.user, &task.name, &branch, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, &task.user, &task.name))?;

    let mut discovered = BTreeMap::new();
    walk_repository(
        remote,
        cache,
        &task.user,
        &task.name,
        &sha,
        &task.existing,
        cancel,
        |walked: WalkedPackage| {
            let pkg_path = PackagePath::new(&task.site, &task.user, &task.name, &walked.dir);
            let doc = DocInfo {
                name: walked.contents.name,
                synopsis: synopsis(&walked.contents.description),
                description: walked.contents.description,
                readme_fn: walked.contents.readme_fn,
                readme_data: walked.contents.readme_data,
                imports: walked.contents.imports,
                test_imports: walked.contents.test_imports,
                imported_by: Vec::new(),
                stars: repo_info.stars,
                last_crawl: Millis::now(),
                source: task.site.clone(),
            };
            actions.lock().unwrap().push(NewDocAction::update(pkg_path.clone(), doc));
            discovered.insert(walked.dir.clone(), pkg_path);
        },
        |dir, err| {
            warn!(
                site = task.site.as_str(),
                user = %task.user,
                name = %task.name,
                dir = %dir,
                error = %err,
                "package invalid during repository walk"
            );
        },
    )
    .await?;

    store.update_repository(&task.site, &task.user, &task.name, |_| Repository {
        branch: branch.clone(),
        signature: sha.clone(),
        crawl_time: Some(Millis::now()),
        packages: discovered.clone(),
    })?;

    Ok(())
}

fn hash_key(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn due_packages(
    store: &CrawlStore,
    now: Millis,
    noncrawl_hosts: &[String],
    max_per_site: usize,
) -> gcse_core::Result<Vec<PackagePath>> {
    let mut by_site: BTreeMap<String, Vec<Candidate<PackagePath>>> = BTreeMap::new();
    store.for_each_due_package(now, |path, entry| {
        let Some((site, _, _, _)) = path.parts() else {
            return;
        };
        if noncrawl_hosts.iter().any(|h| h == site) {
            return;
        }
        by_site.entry(site.to_string()).or_default().push(Candidate {
            item: path.clone(),
            sort_key: path.as_str().to_string(),
            last_crawl: entry.last_crawl,
        });
    })?;

    Ok(by_site
        .into_values()
        .flat_map(|candidates| select_top_n(candidates, max_per_site))
        .collect())
}

fn due_persons(
    store: &CrawlStore,
    now: Millis,
    noncrawl_hosts: &[String],
    max_per_site: usize,
) -> gcse_core::Result<Vec<PersonId>> {
    let mut by_site: BTreeMap<String, Vec<Candidate<PersonId>>> = BTreeMap::new();
    store.for_each_due_person(now, |id, entry| {
        let Some((site, _)) = id.parts() else {
            return;
        };
        if noncrawl_hosts.iter().any(|h| h == site) {
            return;
        }
        by_site.entry(site.to_string()).or_default().push(Candidate {
            item: id.clone(),
            sort_key: id.as_str().to_string(),
            last_crawl: entry.last_crawl,
        });
    })?;

    Ok(by_site
        .into_values()
        .flat_map(|candidates| select_top_n(candidates, max_per_site))
        .collect())
}

/// Every known repository, across every known site, excluding
/// `noncrawl_hosts` (`spec.md` §5's third pool). Unlike packages and
/// persons, repositories have no `schedule_time`; freshness is instead
/// checked per repository inside [`walk_repository`] via
/// `Repository::is_fresh`, so every known repository is a candidate task
/// every run.
fn due_repositories(
    store: &CrawlStore,
    noncrawl_hosts: &[String],
) -> gcse_core::Result<Vec<RepoTask>> {
    let mut sites = Vec::new();
    store.for_each_repository_site(|site| sites.push(site.clone()))?;

    let mut tasks = Vec::new();
    for site in sites {
        if noncrawl_hosts.iter().any(|h| h == site.as_str()) {
            continue;
        }
        store.for_each_repository_of_site(&site, |user, name, repo| {
            tasks.push(RepoTask {
                site: site.clone(),
                user: user.to_string(),
                name: name.to_string(),
                existing: repo.clone(),
            });
        })?;
    }

    Ok(tasks)
}
