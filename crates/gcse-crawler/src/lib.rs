//! The crawl orchestration crate: the scheduler (C5), the package fetcher
//! (C6) and repo walker (C7) built on a shared per-file scanner, the merge
//! stage (C8), and the worker-pool/backoff model of `spec.md` §5.

pub mod fetcher;
pub mod merge;
pub mod package;
pub mod parse;
pub mod person;
pub mod pool;
pub mod run;
pub mod scheduler;
pub mod walker;

pub use package::crawl_package;
pub use person::crawl_person;
pub use pool::run_pool;
pub use run::{run_scheduled_crawl, RunConfig, RunOutcome};
pub use scheduler::{select_top_n, Candidate};
pub use walker::{walk_repository, WalkedPackage};
