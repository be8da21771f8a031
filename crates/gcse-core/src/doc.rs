//! The package document and the merge action log (`spec.md` §3, §4.8).

use crate::ids::{PackagePath, Site};
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// A package document, keyed by its canonical [`PackagePath`].
///
/// Invariant (`spec.md` §3): a document is only emitted when `name` is
/// non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocInfo {
    /// Package name (the declared package clause, not the path).
    pub name: String,
    /// One-line synopsis (first sentence of the leading doc comment).
    pub synopsis: String,
    /// Full description (leading doc comment).
    pub description: String,
    /// README filename, if any (no directory component).
    pub readme_fn: String,
    /// Raw README body.
    pub readme_data: String,
    /// Non-test imports.
    pub imports: Vec<String>,
    /// Test-only imports.
    pub test_imports: Vec<String>,
    /// Canonical paths of packages that import this one (reverse index,
    /// `spec.md` §9 — derived by a reverse-index pass, never live-linked).
    pub imported_by: Vec<PackagePath>,
    /// Star count of the owning repository.
    pub stars: u32,
    /// Time of the last successful crawl.
    pub last_crawl: Millis,
    /// Hosting site this document was crawled from.
    pub source: Site,
}

impl DocInfo {
    /// Whether this document satisfies the emission invariant.
    #[must_use]
    pub fn is_emittable(&self) -> bool {
        !self.name.is_empty()
    }
}

/// The kind of change a [`NewDocAction`] represents (`spec.md` §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// The whole document was (re)crawled.
    Update,
    /// Only the star count changed.
    Stars,
    /// The document was deleted.
    Del,
    /// Pre-existing document carried through unchanged.
    Original,
}

/// An append-only record produced while crawling, folded by the merge stage
/// (`spec.md` §4.8). `doc` is `None` iff `action == Action::Del`, per the
/// invariant in `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocAction {
    /// The package path this action concerns.
    pub path: PackagePath,
    /// What kind of change this is.
    pub action: Action,
    /// The updated document, absent for `Action::Del`.
    pub doc: Option<DocInfo>,
}

impl NewDocAction {
    /// Build an `Action::Del` action; `doc` is always `None`.
    #[must_use]
    pub fn deleted(path: PackagePath) -> Self {
        Self {
            path,
            action: Action::Del,
            doc: None,
        }
    }

    /// Build an `Action::Update` action.
    #[must_use]
    pub fn update(path: PackagePath, doc: DocInfo) -> Self {
        Self {
            path,
            action: Action::Update,
            doc: Some(doc),
        }
    }

    /// Build an `Action::Stars`-only action.
    #[must_use]
    pub fn stars(path: PackagePath, doc: DocInfo) -> Self {
        Self {
            path,
            action: Action::Stars,
            doc: Some(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> DocInfo {
        DocInfo {
            name: name.to_string(),
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
        }
    }

    #[test]
    fn empty_name_is_not_emittable() {
        assert!(!doc("").is_emittable());
        assert!(doc("a").is_emittable());
    }

    #[test]
    fn del_action_has_no_doc() {
        let path = PackagePath::from_raw("github.com/a/b");
        let action = NewDocAction::deleted(path);
        assert!(action.doc.is_none());
        assert_eq!(action.action, Action::Del);
    }
}
