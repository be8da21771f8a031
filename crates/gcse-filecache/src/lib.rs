//! Content-addressed file cache (C1, `spec.md` §4.1).
//!
//! Backed by `sled`, the idiomatic-Rust analogue of the original's
//! BoltDB-backed `spider.BoltFileCache`. Keys are raw blob-hash bytes as
//! handed back by the remote host, never recomputed locally; a hit is
//! treated as authoritative because the remote defines the content address.

use gcse_core::{CachedFile, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A content-addressed, durable cache of parsed source files.
#[derive(Clone)]
pub struct FileCache {
    tree: sled::Tree,
    counters: Arc<dashmap_free::CounterMap>,
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache").finish_non_exhaustive()
    }
}

impl FileCache {
    /// Open (or create) a file cache backed by the given `sled` database.
    ///
    /// # Errors
    /// Returns an error if the cache tree cannot be opened.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("filecache")?;
        Ok(Self {
            tree,
            counters: Arc::new(dashmap_free::CounterMap::default()),
        })
    }

    /// Look up a cached file by its remote blob hash. Returns `None` on a
    /// cache miss; callers treat a hit as authoritative and skip the remote
    /// fetch entirely (`spec.md` §4.1 soundness note, P4).
    ///
    /// # Errors
    /// Returns an error if the underlying store or the decode fails.
    pub fn get(&self, blob_hash: &[u8]) -> Result<Option<CachedFile>> {
        match self.tree.get(blob_hash)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the cached entry for `blob_hash`. Idempotent:
    /// writing the same value twice is a no-op from the caller's
    /// perspective (`spec.md` §4.1, §5 "writes are idempotent").
    ///
    /// # Errors
    /// Returns an error if encoding or the underlying store write fails.
    pub fn set(&self, blob_hash: &[u8], value: &CachedFile) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.tree.insert(blob_hash, bytes)?;
        Ok(())
    }

    /// Observability hook (`spec.md` §4.1). Increments a named monotonic
    /// counter and logs it at `debug`; never fails the caller.
    pub fn inc_counter(&self, name: &str) {
        let value = self.counters.inc(name);
        debug!(counter = name, value, "filecache counter");
    }
}

/// A tiny named-counter map. Kept local rather than pulling in `dashmap`
/// for four atomics' worth of bookkeeping.
mod dashmap_free {
    use super::{AtomicU64, Ordering};
    use parking_lot::RwLock;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct CounterMap(RwLock<HashMap<String, AtomicU64>>);

    impl CounterMap {
        pub fn inc(&self, name: &str) -> u64 {
            if let Some(counter) = self.0.read().get(name) {
                return counter.fetch_add(1, Ordering::Relaxed) + 1;
            }
            let mut guard = self.0.write();
            let counter = guard.entry(name.to_string()).or_insert_with(|| AtomicU64::new(0));
            counter.fetch_add(1, Ordering::Relaxed) + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcse_core::FileStatus;

    fn open_tmp() -> (sled::Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        (db, dir)
    }

    fn sample() -> CachedFile {
        CachedFile {
            status: Some(FileStatus::ParseSuccess),
            package_name: "http".to_string(),
            imports: vec!["net/url".to_string()],
            is_test: false,
            doc_comment: "Package http provides HTTP client and server.".to_string(),
        }
    }

    #[test]
    fn miss_then_hit() {
        let (db, _dir) = open_tmp();
        let cache = FileCache::open(&db).unwrap();
        let hash = b"abc123";

        assert!(cache.get(hash).unwrap().is_none());

        cache.set(hash, &sample()).unwrap();
        let got = cache.get(hash).unwrap().unwrap();
        assert_eq!(got.package_name, "http");
    }

    #[test]
    fn set_is_idempotent() {
        let (db, _dir) = open_tmp();
        let cache = FileCache::open(&db).unwrap();
        let hash = b"xyz";

        cache.set(hash, &sample()).unwrap();
        cache.set(hash, &sample()).unwrap();
        assert_eq!(cache.get(hash).unwrap().unwrap(), sample());
    }

    #[test]
    fn counters_never_fail() {
        let (db, _dir) = open_tmp();
        let cache = FileCache::open(&db).unwrap();
        cache.inc_counter("hits");
        cache.inc_counter("hits");
        cache.inc_counter("misses");
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let hash = b"persisted";
        {
            let db = sled::open(dir.path()).unwrap();
            let cache = FileCache::open(&db).unwrap();
            cache.set(hash, &sample()).unwrap();
            db.flush().unwrap();
        }
        let db = sled::open(dir.path()).unwrap();
        let cache = FileCache::open(&db).unwrap();
        assert!(cache.get(hash).unwrap().is_some());
    }
}
