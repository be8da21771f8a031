//! Scheduling and crawl-state records (`spec.md` §3).

use crate::ids::PackagePath;
use crate::time::Millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The crawler's schema generation. Bumped whenever a persisted record's
/// shape changes; see [`CrawlingEntry::effective_etag`].
pub const CRAWLER_VERSION: u32 = 1;

/// A scheduling record keyed by package or person id (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlingEntry {
    /// When this item is next due for crawling.
    pub schedule_time: Millis,
    /// The schema generation this entry was written under.
    pub version: u32,
    /// Conditional-request etag from the last successful fetch.
    pub etag: String,
    /// When this item last finished a *successful* crawl. `None` means
    /// never crawled, the scheduler's (C5, `spec.md` §4.5) highest-priority
    /// case; distinct from `schedule_time`, which is the next due time.
    pub last_crawl: Option<Millis>,
}

impl CrawlingEntry {
    /// A brand new entry, due immediately, never crawled.
    #[must_use]
    pub fn new_now() -> Self {
        Self {
            schedule_time: Millis::now(),
            version: CRAWLER_VERSION,
            etag: String::new(),
            last_crawl: None,
        }
    }

    /// The etag to send on the next fetch: empty when the schema generation
    /// has moved on, since a stale etag could suppress a fetch we now need
    /// for a different shape of data (`spec.md` §3).
    #[must_use]
    pub fn effective_etag(&self) -> &str {
        if self.version == CRAWLER_VERSION {
            &self.etag
        } else {
            ""
        }
    }
}

/// Status of a single cached source file (`spec.md` §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    /// Parsed successfully; `CachedFile`'s other fields are meaningful.
    ParseSuccess,
    /// Parsing failed on a non-test file; the owning package is invalid.
    ParseFailed,
    /// The file should be skipped (too large, build-tag excluded, or a
    /// parse failure on a test file).
    ShouldIgnore,
}

/// A file-cache value, keyed by blob hash (`spec.md` §3, §4.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    /// Parse outcome.
    pub status: Option<FileStatus>,
    /// Declared package name, when `status == ParseSuccess`.
    pub package_name: String,
    /// Imports declared by this file.
    pub imports: Vec<String>,
    /// Whether this is a `_test.go` file.
    pub is_test: bool,
    /// Leading doc comment, if any.
    pub doc_comment: String,
}

impl CachedFile {
    /// The `ShouldIgnore` sentinel value.
    #[must_use]
    pub fn should_ignore() -> Self {
        Self {
            status: Some(FileStatus::ShouldIgnore),
            ..Self::default()
        }
    }

    /// The `ParseFailed` sentinel value.
    #[must_use]
    pub fn parse_failed() -> Self {
        Self {
            status: Some(FileStatus::ParseFailed),
            ..Self::default()
        }
    }
}

/// A repository record keyed by `(site, user, name)` (`spec.md` §3, §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    /// Default branch crawled.
    pub branch: String,
    /// Tree SHA at the last successful walk.
    pub signature: String,
    /// Time of the last walk attempt.
    pub crawl_time: Option<Millis>,
    /// Packages discovered under this repository, by in-repo sub path.
    pub packages: BTreeMap<String, PackagePath>,
}

impl Repository {
    /// `spec.md` §3: "if `signature` equals the remote branch SHA, the
    /// repository is fresh and walking is skipped."
    #[must_use]
    pub fn is_fresh(&self, remote_sha: &str) -> bool {
        !self.signature.is_empty() && self.signature == remote_sha
    }
}

/// A person record keyed by `site:username` (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    /// Canonical paths of packages owned by this person.
    pub packages: Vec<PackagePath>,
}

/// The jittered re-crawl age for persons: ~100 days ±10% (`spec.md` §3).
pub const DEFAULT_PERSON_AGE_DAYS: i64 = 100;

/// Reschedule delay after a transient failure (`spec.md` §5, §7).
pub const FAILURE_RETRY_DELAY_HOURS: i64 = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_version_clears_etag() {
        let mut entry = CrawlingEntry::new_now();
        entry.etag = "abc".to_string();
        assert_eq!(entry.effective_etag(), "abc");

        entry.version = CRAWLER_VERSION + 1;
        assert_eq!(entry.effective_etag(), "");
    }

    #[test]
    fn repository_freshness() {
        let mut repo = Repository::default();
        assert!(!repo.is_fresh("sha1"));
        repo.signature = "sha1".to_string();
        assert!(repo.is_fresh("sha1"));
        assert!(!repo.is_fresh("sha2"));
    }
}
