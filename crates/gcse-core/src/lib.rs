//! Shared types for the crawler: identifiers, time, the package document,
//! scheduling records, and the error taxonomy.

pub mod crawl;
pub mod doc;
pub mod error;
pub mod ids;
pub mod time;

pub use crawl::{CachedFile, CrawlingEntry, FileStatus, Person, Repository, CRAWLER_VERSION};
pub use doc::{Action, DocInfo, NewDocAction};
pub use error::{Error, Result};
pub use ids::{PackagePath, PersonId, Site};
pub use time::Millis;
