//! `gcse-crawler` — the distributed source-code crawler's CLI entry point.
//!
//! Flat flag surface, no subcommands (`SPEC_FULL.md` §6.3, matching the
//! original's flag-only interface): `--pkg`/`--person` crawl a single item
//! synchronously and exit; with no flags, runs the full scheduled crawl.

mod config;

use clap::Parser;
use config::Config;
use gcse_core::{PackagePath, Site};
use gcse_crawler::{crawl_package, crawl_person, run_scheduled_crawl, RunConfig};
use gcse_remote::GithubAdapter;
use gcse_store::CrawlStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// The distributed source-code crawler.
#[derive(Parser, Debug)]
#[command(name = "gcse-crawler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Crawl a single package synchronously and print the result.
    #[arg(long)]
    pkg: Option<String>,

    /// Crawl a single person synchronously and print the result.
    #[arg(long)]
    person: Option<String>,

    /// Override the stored etag for a single `--pkg` fetch.
    #[arg(long)]
    etag: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./gcse.toml")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Disable ANSI colors in log output.
    #[arg(long)]
    no_ansi: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(if cli.verbose { Level::DEBUG } else { Level::INFO }.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_ansi)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "crawler failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> gcse_core::Result<ExitCode> {
    let config = Config::load(&cli.config)?;

    let token = if config.github_personal_token.is_empty() {
        None
    } else {
        Some(config.github_personal_token.clone())
    };
    let remote: Arc<dyn gcse_remote::RemoteAdapter> = Arc::new(GithubAdapter::new(token)?);

    std::fs::create_dir_all(&config.data_root)
        .map_err(|e| gcse_core::Error::io(config.data_root.clone(), e))?;
    let store_db = sled::open(config.data_root.join("store.sled"))?;
    let cache_db = sled::open(config.data_root.join("filecache.sled"))?;
    let store = CrawlStore::open(&store_db)?;
    let cache = gcse_filecache::FileCache::open(&cache_db)?;

    let cancel = CancellationToken::new();

    if let Some(person) = &cli.person {
        return crawl_single_person(remote.as_ref(), &store, person, &cancel).await;
    }

    if let Some(pkg) = &cli.pkg {
        return crawl_single_package(remote.as_ref(), &cache, &store, pkg, cli.etag.as_deref(), &cancel).await;
    }

    info!("crawler started");
    let run_config = RunConfig {
        due_per_run: config.due_per_run,
        noncrawl_hosts: config.noncrawl_hosts,
        package_partitions: config.package_partitions,
        person_partitions: config.person_partitions,
        max_crawl_per_site: config.max_crawl_per_site,
    };
    let outcome = run_scheduled_crawl(remote, &cache, &store, &run_config, cancel).await?;

    if !outcome.is_clean() {
        error!(
            package_failures = outcome.package_errors.len(),
            person_failures = outcome.person_errors.len(),
            "some job may have failed"
        );
        return Ok(ExitCode::FAILURE);
    }

    info!("crawler finished OK");
    Ok(ExitCode::SUCCESS)
}

async fn crawl_single_person(
    remote: &dyn gcse_remote::RemoteAdapter,
    store: &CrawlStore,
    person: &str,
    cancel: &CancellationToken,
) -> gcse_core::Result<ExitCode> {
    info!(person, "crawling single person");
    let site = Site::github();
    match crawl_person(remote, store, &site, person, cancel).await {
        Ok(p) => {
            println!("Person {person}: {p:#?}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("Crawling person {person:?} failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn crawl_single_package(
    remote: &dyn gcse_remote::RemoteAdapter,
    cache: &gcse_filecache::FileCache,
    store: &CrawlStore,
    pkg: &str,
    etag: Option<&str>,
    cancel: &CancellationToken,
) -> gcse_core::Result<ExitCode> {
    info!(pkg, "crawling single package");
    let path = PackagePath::from_raw(pkg.to_string());

    if let Some(etag) = etag {
        store.set_package_etag(&path, etag)?;
    }

    match crawl_package(remote, cache, store, &path, cancel).await {
        Ok(action) => {
            println!("Package {pkg}: {action:#?}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("Crawling package {pkg:?} failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
