//! Single-person crawl: lists a user's repositories and enqueues their root
//! packages (`original_source/cmd/gcse-crawler/person.go`'s `pushPerson`).

use gcse_core::{Millis, Person, PersonId, Result, Site, DEFAULT_PERSON_AGE_DAYS};
use gcse_remote::RemoteAdapter;
use gcse_store::CrawlStore;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio_util::sync::CancellationToken;

/// Crawl one person: list their repositories, enqueue each repository's
/// root package for the package pool, and reschedule the person at a
/// jittered `DEFAULT_PERSON_AGE_DAYS` out (`original_source`'s
/// `DefaultPersonAge*(1 + (rand-0.5)*0.2)`, i.e. ±10%).
///
/// The jitter is derived deterministically from the person id's hash
/// rather than a random-number generator, so repeated crawls of the same
/// person spread out consistently without adding a `rand` dependency the
/// rest of this workspace has no other use for.
///
/// # Errors
/// Returns a remote-adapter error if listing the user's repositories
/// fails, or a store error if persisting the result fails.
pub async fn crawl_person(
    remote: &dyn RemoteAdapter,
    store: &CrawlStore,
    site: &Site,
    username: &str,
    cancel: &CancellationToken,
) -> Result<Person> {
    let id = PersonId::new(site, username);

    let result = crawl_inner(remote, store, site, username, &id, cancel).await;

    match &result {
        Ok(_) => {
            store.record_person_crawl(&id, jittered_recrawl_time(&id), Millis::now())?;
        }
        Err(_) => {
            store.schedule_person(
                &id,
                Millis::now().plus(chrono::Duration::hours(gcse_core::FAILURE_RETRY_DELAY_HOURS)),
            )?;
        }
    }

    result
}

async fn crawl_inner(
    remote: &dyn RemoteAdapter,
    store: &CrawlStore,
    site: &Site,
    username: &str,
    id: &PersonId,
    cancel: &CancellationToken,
) -> Result<Person> {
    let repos = remote
        .list_user_repos(username, cancel)
        .await
        .map_err(|e| gcse_remote::into_invalid_repository(e, username, "*"))?;

    let mut person = Person::default();
    for (repo_name, repo_info) in &repos {
        let path = gcse_core::PackagePath::new(site, username, repo_name, "");
        store.append_package(&path)?;
        person.packages.push(path);

        // Seed a repository record so the scheduled crawl's repo-walker
        // pool (`spec.md` §5, `run.rs`) has something to walk; a person
        // crawl is the only place a new repository becomes known.
        store.update_repository(site, username, repo_name, |existing| {
            let mut repo = existing.unwrap_or_default();
            if repo.branch.is_empty() {
                repo.branch = repo_info.default_branch.clone();
            }
            repo
        })?;
    }

    Ok(person)
}

/// `DEFAULT_PERSON_AGE_DAYS` jittered by up to ±10%, keyed off `id` so the
/// same person always lands on the same offset within that range.
fn jittered_recrawl_time(id: &PersonId) -> Millis {
    let mut hasher = DefaultHasher::new();
    id.as_str().hash(&mut hasher);
    let bucket = (hasher.finish() % 2001) as i64 - 1000; // [-1000, 1000]
    let jitter_pct = bucket as f64 / 10_000.0; // [-0.1, 0.1]
    let base_hours = DEFAULT_PERSON_AGE_DAYS * 24;
    let jittered_hours = (base_hours as f64 * (1.0 + jitter_pct)) as i64;
    Millis::now().plus(chrono::Duration::hours(jittered_hours))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gcse_remote::{RemoteError, RepoInfo, TreeEntry};
    use std::collections::HashMap;

    struct StubRemote(HashMap<String, RepoInfo>);

    #[async_trait]
    impl RemoteAdapter for StubRemote {
        async fn list_user_repos(
            &self,
            _u: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<HashMap<String, RepoInfo>, RemoteError> {
            Ok(self.0.clone())
        }
        async fn read_repository(
            &self,
            _u: &str,
            _n: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<RepoInfo, RemoteError> {
            Ok(RepoInfo::default())
        }
        async fn repo_branch_sha(
            &self,
            _u: &str,
            _n: &str,
            _b: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<String, RemoteError> {
            Ok(String::new())
        }
        async fn get_tree(
            &self,
            _u: &str,
            _n: &str,
            _sha: &str,
            _recursive: bool,
            _c: &CancellationToken,
        ) -> std::result::Result<Vec<TreeEntry>, RemoteError> {
            Ok(Vec::new())
        }
        async fn list_directory(
            &self,
            _u: &str,
            _n: &str,
            _p: &str,
            _b: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<Vec<TreeEntry>, RemoteError> {
            Ok(Vec::new())
        }
        async fn get_file(
            &self,
            _u: &str,
            _n: &str,
            _path: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<String, RemoteError> {
            Err(RemoteError::NotFound)
        }
        async fn search_repositories(
            &self,
            _q: &str,
            _c: &CancellationToken,
        ) -> std::result::Result<Vec<RepoInfo>, RemoteError> {
            Ok(Vec::new())
        }
    }

    fn open_store() -> (CrawlStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (CrawlStore::open(&db).unwrap(), dir)
    }

    #[tokio::test]
    async fn crawl_person_enqueues_root_packages() {
        let mut repos = HashMap::new();
        repos.insert("go".to_string(), RepoInfo::default());
        repos.insert("net".to_string(), RepoInfo::default());
        let remote = StubRemote(repos);
        let (store, _dir) = open_store();
        let site = Site::github();
        let cancel = CancellationToken::new();

        let person = crawl_person(&remote, &store, &site, "golang", &cancel)
            .await
            .unwrap();
        assert_eq!(person.packages.len(), 2);

        let id = PersonId::new(&site, "golang");
        let entry = store.get_person_entry(&id).unwrap().unwrap();
        let one_year_out = Millis::now().plus(chrono::Duration::days(90));
        assert!(entry.schedule_time > one_year_out);
    }

    #[test]
    fn jitter_is_within_ten_percent_and_deterministic() {
        let id = PersonId::new(&Site::github(), "someone");
        let a = jittered_recrawl_time(&id);
        let b = jittered_recrawl_time(&id);
        // Both calls happen close enough in time that the jittered value,
        // which is dominated by a ~100 day offset, should match to the
        // minute.
        assert!((a.as_millis() - b.as_millis()).abs() < 60_000);
    }
}
