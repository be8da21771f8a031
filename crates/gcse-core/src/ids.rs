//! Canonical identifiers (`spec.md` §3, GLOSSARY).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hosting site name, e.g. `"github.com"`.
///
/// Kept as a newtype rather than a bare `String` so that call sites cannot
/// accidentally pass a package path or user name where a site is expected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Site(String);

impl Site {
    /// Wrap a site name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The well-known GitHub site.
    #[must_use]
    pub fn github() -> Self {
        Self::new("github.com")
    }

    /// Borrow the site name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical package path: `host/user/repo[/sub]` (`spec.md` §3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackagePath(String);

impl PackagePath {
    /// Build a canonical path from its parts. `sub` is the in-repository
    /// directory path, empty for the repository root package.
    #[must_use]
    pub fn new(site: &Site, user: &str, repo: &str, sub: &str) -> Self {
        let mut s = format!("{site}/{user}/{repo}");
        if !sub.is_empty() {
            let sub = sub.trim_start_matches('/');
            s.push('/');
            s.push_str(sub);
        }
        Self(s)
    }

    /// Wrap an already-canonical string as-is (e.g. read back from storage).
    #[must_use]
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the canonical path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(site, user, repo, sub)`. `sub` is `""` for a
    /// repository-root package.
    #[must_use]
    pub fn parts(&self) -> Option<(&str, &str, &str, &str)> {
        let mut parts = self.0.splitn(4, '/');
        let site = parts.next()?;
        let user = parts.next()?;
        let repo = parts.next()?;
        let sub = parts.next().unwrap_or("");
        Some((site, user, repo, sub))
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A person identifier: `site:username` (`spec.md` §3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(String);

impl PersonId {
    /// Build `site:username`.
    #[must_use]
    pub fn new(site: &Site, username: &str) -> Self {
        Self(format!("{site}:{username}"))
    }

    /// Wrap an already-formatted id.
    #[must_use]
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the raw `site:username` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(site, username)`.
    #[must_use]
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.0.split_once(':')
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
