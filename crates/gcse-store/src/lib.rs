//! The durable crawl store (C4, `spec.md` §4.4): per-site repository,
//! package, person, and document records over `sled`.

use gcse_core::{CrawlingEntry, DocInfo, PackagePath, PersonId, Repository, Result, Site};
use std::sync::Arc;

/// A handle to the crawl store's trees. Cheaply clonable; every clone
/// shares the same underlying `sled::Db`.
#[derive(Clone)]
pub struct CrawlStore {
    inner: Arc<Inner>,
}

struct Inner {
    repositories: sled::Tree,
    packages: sled::Tree,
    persons: sled::Tree,
    documents: sled::Tree,
}

impl std::fmt::Debug for CrawlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlStore").finish_non_exhaustive()
    }
}

fn repo_key(site: &Site, user: &str, name: &str) -> String {
    format!("{site}/{user}/{name}")
}

impl CrawlStore {
    /// Open (or create) the crawl store against an existing `sled` database.
    ///
    /// # Errors
    /// Returns an error if any of the backing trees cannot be opened.
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                repositories: db.open_tree("repositories")?,
                packages: db.open_tree("packages")?,
                persons: db.open_tree("persons")?,
                documents: db.open_tree("documents")?,
            }),
        })
    }

    // --- repositories -----------------------------------------------

    /// Call `f(site)` once for every distinct site with at least one
    /// repository record.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be scanned or decoded.
    pub fn for_each_repository_site(&self, mut f: impl FnMut(&Site)) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in self.inner.repositories.iter() {
            let (key, _) = entry?;
            let key = String::from_utf8_lossy(&key);
            if let Some((site, _)) = key.split_once('/') {
                if seen.insert(site.to_string()) {
                    f(&Site::new(site));
                }
            }
        }
        Ok(())
    }

    /// Call `f(user, name, repo)` for every repository record under `site`.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be scanned or decoded.
    pub fn for_each_repository_of_site(
        &self,
        site: &Site,
        mut f: impl FnMut(&str, &str, &Repository),
    ) -> Result<()> {
        let prefix = format!("{site}/");
        for entry in self.inner.repositories.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let key = String::from_utf8_lossy(&key);
            let Some((_, rest)) = key.split_once('/') else {
                continue;
            };
            let Some((user, name)) = rest.split_once('/') else {
                continue;
            };
            let repo: Repository = bincode::deserialize(&value)?;
            f(user, name, &repo);
        }
        Ok(())
    }

    /// Read-modify-write a repository record under a single-key atomic
    /// compare-and-swap loop (`spec.md` §4.4's "read-modify-write under a
    /// write lock", realized without a separate mutex since `sled` trees
    /// are internally lock-free per key).
    ///
    /// # Errors
    /// Returns an error if the CAS loop cannot make progress or the record
    /// cannot be (de)serialized.
    pub fn update_repository(
        &self,
        site: &Site,
        user: &str,
        name: &str,
        mut mutator: impl FnMut(Option<Repository>) -> Repository,
    ) -> Result<()> {
        let key = repo_key(site, user, name);
        loop {
            let current = self.inner.repositories.get(&key)?;
            let current_repo = current
                .as_deref()
                .map(bincode::deserialize)
                .transpose()?;
            let next = mutator(current_repo);
            let next_bytes = bincode::serialize(&next)?;
            let swapped = self.inner.repositories.compare_and_swap(
                &key,
                current.as_deref(),
                Some(next_bytes),
            )?;
            if swapped.is_ok() {
                self.inner.repositories.flush()?;
                return Ok(());
            }
        }
    }

    /// Remove a repository record entirely.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn delete_repository(&self, site: &Site, user: &str, name: &str) -> Result<()> {
        let key = repo_key(site, user, name);
        self.inner.repositories.remove(&key)?;
        self.inner.repositories.flush()?;
        Ok(())
    }

    // --- scheduling ---------------------------------------------------

    /// Upsert a package's crawling entry with the given schedule time,
    /// preserving its `etag`/`version` if one already exists.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn schedule_package(&self, path: &PackagePath, at: gcse_core::Millis) -> Result<()> {
        schedule(&self.inner.packages, path.as_str(), at)
    }

    /// Upsert a person's crawling entry with the given schedule time.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn schedule_person(&self, id: &PersonId, at: gcse_core::Millis) -> Result<()> {
        schedule(&self.inner.persons, id.as_str(), at)
    }

    /// Override a package's stored etag (the `--etag` CLI flag,
    /// `SPEC_FULL.md` §6.3), creating the entry due-now if absent.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn set_package_etag(&self, path: &PackagePath, etag: &str) -> Result<()> {
        let mut entry = self.get_package_entry(path)?.unwrap_or_else(CrawlingEntry::new_now);
        entry.etag = etag.to_string();
        let bytes = bincode::serialize(&entry)?;
        self.inner.packages.insert(path.as_str(), bytes)?;
        self.inner.packages.flush()?;
        Ok(())
    }

    /// Record a *successful* package crawl: sets `last_crawl` to `completed_at`
    /// in addition to rescheduling, so the scheduler (C5) can rank it behind
    /// never-crawled items on the next run (`spec.md` §4.5).
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn record_package_crawl(
        &self,
        path: &PackagePath,
        next_due: gcse_core::Millis,
        completed_at: gcse_core::Millis,
    ) -> Result<()> {
        record_crawl(&self.inner.packages, path.as_str(), next_due, completed_at)
    }

    /// As [`Self::record_package_crawl`], for persons.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn record_person_crawl(
        &self,
        id: &PersonId,
        next_due: gcse_core::Millis,
        completed_at: gcse_core::Millis,
    ) -> Result<()> {
        record_crawl(&self.inner.persons, id.as_str(), next_due, completed_at)
    }

    /// Insert a package if absent, scheduled for immediate crawling
    /// (`spec.md` §4.4 `AppendPackage`: "insert if absent with
    /// `scheduleTime = now` so the scheduler picks it up on the next run").
    /// A no-op if the package is already known.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn append_package(&self, path: &PackagePath) -> Result<()> {
        if self.inner.packages.contains_key(path.as_str())? {
            return Ok(());
        }
        schedule(&self.inner.packages, path.as_str(), gcse_core::Millis::now())
    }

    /// Read a package's crawling entry, if any.
    ///
    /// # Errors
    /// Returns an error if the record cannot be decoded.
    pub fn get_package_entry(&self, path: &PackagePath) -> Result<Option<CrawlingEntry>> {
        get_entry(&self.inner.packages, path.as_str())
    }

    /// Read a person's crawling entry, if any.
    ///
    /// # Errors
    /// Returns an error if the record cannot be decoded.
    pub fn get_person_entry(&self, id: &PersonId) -> Result<Option<CrawlingEntry>> {
        get_entry(&self.inner.persons, id.as_str())
    }

    /// Remove a package's crawling entry.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn delete_package(&self, path: &PackagePath) -> Result<()> {
        self.inner.packages.remove(path.as_str())?;
        Ok(())
    }

    /// Remove a person's crawling entry.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn delete_person(&self, id: &PersonId) -> Result<()> {
        self.inner.persons.remove(id.as_str())?;
        Ok(())
    }

    /// Iterate every due package entry (`scheduleTime <= now`), feeding the
    /// scheduler (C5).
    ///
    /// # Errors
    /// Returns an error if the tree cannot be scanned or decoded.
    pub fn for_each_due_package(
        &self,
        now: gcse_core::Millis,
        mut f: impl FnMut(&PackagePath, &CrawlingEntry),
    ) -> Result<()> {
        for entry in self.inner.packages.iter() {
            let (key, value) = entry?;
            let crawling: CrawlingEntry = bincode::deserialize(&value)?;
            if crawling.schedule_time <= now {
                let path = PackagePath::from_raw(String::from_utf8_lossy(&key).into_owned());
                f(&path, &crawling);
            }
        }
        Ok(())
    }

    /// Iterate every due person entry (`scheduleTime <= now`).
    ///
    /// # Errors
    /// Returns an error if the tree cannot be scanned or decoded.
    pub fn for_each_due_person(
        &self,
        now: gcse_core::Millis,
        mut f: impl FnMut(&PersonId, &CrawlingEntry),
    ) -> Result<()> {
        for entry in self.inner.persons.iter() {
            let (key, value) = entry?;
            let crawling: CrawlingEntry = bincode::deserialize(&value)?;
            if crawling.schedule_time <= now {
                let id = PersonId::from_raw(String::from_utf8_lossy(&key).into_owned());
                f(&id, &crawling);
            }
        }
        Ok(())
    }

    // --- documents ------------------------------------------------------

    /// Read the current authoritative document for `path`, if any — the
    /// merge stage's (C8) "old" side (`spec.md` §4.8).
    ///
    /// # Errors
    /// Returns an error if the record cannot be decoded.
    pub fn get_document(&self, path: &PackagePath) -> Result<Option<DocInfo>> {
        match self.inner.documents.get(path.as_str())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace the authoritative document for `path`.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn put_document(&self, path: &PackagePath, doc: &DocInfo) -> Result<()> {
        let bytes = bincode::serialize(doc)?;
        self.inner.documents.insert(path.as_str(), bytes)?;
        Ok(())
    }

    /// Remove the authoritative document for `path`.
    ///
    /// # Errors
    /// Returns an error if the underlying store write fails.
    pub fn delete_document(&self, path: &PackagePath) -> Result<()> {
        self.inner.documents.remove(path.as_str())?;
        Ok(())
    }

    /// Iterate every authoritative document, keyed by its canonical path.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be scanned or decoded.
    pub fn for_each_document(&self, mut f: impl FnMut(&PackagePath, &DocInfo)) -> Result<()> {
        for entry in self.inner.documents.iter() {
            let (key, value) = entry?;
            let doc: DocInfo = bincode::deserialize(&value)?;
            let path = PackagePath::from_raw(String::from_utf8_lossy(&key).into_owned());
            f(&path, &doc);
        }
        Ok(())
    }
}

fn schedule(tree: &sled::Tree, key: &str, at: gcse_core::Millis) -> Result<()> {
    let mut entry = match tree.get(key)? {
        Some(bytes) => bincode::deserialize(&bytes)?,
        None => CrawlingEntry::new_now(),
    };
    entry.schedule_time = at;
    let bytes = bincode::serialize(&entry)?;
    tree.insert(key, bytes)?;
    tree.flush()?;
    Ok(())
}

fn record_crawl(
    tree: &sled::Tree,
    key: &str,
    next_due: gcse_core::Millis,
    completed_at: gcse_core::Millis,
) -> Result<()> {
    let mut entry = match tree.get(key)? {
        Some(bytes) => bincode::deserialize(&bytes)?,
        None => CrawlingEntry::new_now(),
    };
    entry.schedule_time = next_due;
    entry.last_crawl = Some(completed_at);
    let bytes = bincode::serialize(&entry)?;
    tree.insert(key, bytes)?;
    tree.flush()?;
    Ok(())
}

fn get_entry(tree: &sled::Tree, key: &str) -> Result<Option<CrawlingEntry>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcse_core::Millis;

    fn open_tmp() -> (sled::Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (db, dir)
    }

    #[test]
    fn append_package_is_idempotent_on_existing() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let path = PackagePath::from_raw("github.com/a/b");

        store.schedule_package(&path, Millis::now().plus(chrono::Duration::hours(1))).unwrap();
        let before = store.get_package_entry(&path).unwrap().unwrap();

        store.append_package(&path).unwrap();
        let after = store.get_package_entry(&path).unwrap().unwrap();
        assert_eq!(before.schedule_time, after.schedule_time);
    }

    #[test]
    fn append_package_schedules_new_package_now() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let path = PackagePath::from_raw("github.com/a/new");

        assert!(store.get_package_entry(&path).unwrap().is_none());
        store.append_package(&path).unwrap();
        assert!(store.get_package_entry(&path).unwrap().is_some());
    }

    #[test]
    fn update_repository_round_trips() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let site = Site::github();

        store
            .update_repository(&site, "golang", "go", |existing| {
                let mut repo = existing.unwrap_or_default();
                repo.branch = "master".to_string();
                repo.signature = "sha1".to_string();
                repo
            })
            .unwrap();

        let mut seen = Vec::new();
        store
            .for_each_repository_of_site(&site, |user, name, repo| {
                seen.push((user.to_string(), name.to_string(), repo.signature.clone()));
            })
            .unwrap();
        assert_eq!(seen, vec![("golang".to_string(), "go".to_string(), "sha1".to_string())]);
    }

    #[test]
    fn delete_repository_removes_it() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let site = Site::github();

        store
            .update_repository(&site, "a", "b", |_| Repository::default())
            .unwrap();
        store.delete_repository(&site, "a", "b").unwrap();

        let mut count = 0;
        store
            .for_each_repository_of_site(&site, |_, _, _| count += 1)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn due_packages_respect_schedule_time() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let due = PackagePath::from_raw("github.com/a/due");
        let future = PackagePath::from_raw("github.com/a/future");

        store.schedule_package(&due, Millis::now()).unwrap();
        store
            .schedule_package(&future, Millis::now().plus(chrono::Duration::days(1)))
            .unwrap();

        let now = Millis::now();
        let mut seen = Vec::new();
        store.for_each_due_package(now, |p, _| seen.push(p.clone())).unwrap();
        assert_eq!(seen, vec![due]);
    }

    #[test]
    fn record_package_crawl_sets_last_crawl_and_reschedules() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let path = PackagePath::from_raw("github.com/a/b");

        store.append_package(&path).unwrap();
        let before = store.get_package_entry(&path).unwrap().unwrap();
        assert!(before.last_crawl.is_none());

        let completed_at = Millis::now();
        let next_due = completed_at.plus(chrono::Duration::hours(24));
        store.record_package_crawl(&path, next_due, completed_at).unwrap();

        let after = store.get_package_entry(&path).unwrap().unwrap();
        assert_eq!(after.last_crawl, Some(completed_at));
        assert_eq!(after.schedule_time, next_due);
    }

    #[test]
    fn document_round_trip() {
        let (db, _dir) = open_tmp();
        let store = CrawlStore::open(&db).unwrap();
        let path = PackagePath::from_raw("github.com/a/b");
        let doc = DocInfo {
            name: "b".to_string(),
            synopsis: String::new(),
            description: String::new(),
            readme_fn: String::new(),
            readme_data: String::new(),
            imports: Vec::new(),
            test_imports: Vec::new(),
            imported_by: Vec::new(),
            stars: 0,
            last_crawl: Millis::now(),
            source: Site::github(),
        };

        assert!(store.get_document(&path).unwrap().is_none());
        store.put_document(&path, &doc).unwrap();
        assert_eq!(store.get_document(&path).unwrap().unwrap().name, "b");

        store.delete_document(&path).unwrap();
        assert!(store.get_document(&path).unwrap().is_none());
    }
}
