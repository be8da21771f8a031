//! Configuration file loading (`spec.md` §6, `SPEC_FULL.md` §6.5): parse and
//! defaults only, no hierarchical merge or hot reload.

use gcse_core::Error;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

fn default_due_per_run() -> String {
    "1h".to_string()
}

fn default_package_partitions() -> usize {
    8
}

fn default_person_partitions() -> usize {
    4
}

fn default_max_crawl_per_site() -> usize {
    500
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    crawler: RawCrawler,
    #[serde(default)]
    back: RawBack,
}

#[derive(Debug, Deserialize)]
struct RawCrawler {
    #[serde(default = "default_due_per_run")]
    due_per_run: String,
    #[serde(default)]
    noncrawl_hosts: Vec<String>,
    #[serde(default = "default_package_partitions")]
    package_partitions: usize,
    #[serde(default = "default_person_partitions")]
    person_partitions: usize,
    #[serde(default = "default_max_crawl_per_site")]
    max_crawl_per_site: usize,
    #[serde(default)]
    github: RawGithub,
}

impl Default for RawCrawler {
    fn default() -> Self {
        Self {
            due_per_run: default_due_per_run(),
            noncrawl_hosts: Vec::new(),
            package_partitions: default_package_partitions(),
            person_partitions: default_person_partitions(),
            max_crawl_per_site: default_max_crawl_per_site(),
            github: RawGithub::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGithub {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    personal_token: String,
}

fn default_dbroot() -> String {
    "./data".to_string()
}

#[derive(Debug, Deserialize)]
struct RawBack {
    #[serde(default = "default_dbroot")]
    dbroot: String,
}

impl Default for RawBack {
    fn default() -> Self {
        Self {
            dbroot: default_dbroot(),
        }
    }
}

/// The crawler's runtime configuration (`SPEC_FULL.md` §6.5's `[crawler]`
/// and `[back]` tables; `[docdb]`/`[stored]`/`[log]` are recognised but
/// unused by this binary, matching the spec's scope).
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory root: `<root>/store.sled`, `<root>/filecache.sled`.
    pub data_root: std::path::PathBuf,
    /// Per-run wall-clock budget.
    pub due_per_run: Duration,
    /// Sites excluded from scheduled crawling.
    pub noncrawl_hosts: Vec<String>,
    /// Package worker pool partition count.
    pub package_partitions: usize,
    /// Person worker pool partition count.
    pub person_partitions: usize,
    /// Per-site cap on items selected per run.
    pub max_crawl_per_site: usize,
    /// GitHub OAuth client id, falling back to `GITHUB_CLIENT_ID`.
    pub github_client_id: String,
    /// GitHub OAuth client secret, falling back to `GITHUB_CLIENT_SECRET`.
    pub github_client_secret: String,
    /// GitHub personal access token, falling back to
    /// `GITHUB_PERSONAL_ACCESS_TOKEN`.
    pub github_personal_token: String,
}

impl Config {
    /// Load configuration from `path`, a TOML file. Missing files are
    /// treated as an all-defaults configuration (`spec.md` §6.5), since a
    /// fresh checkout has no `gcse.toml` yet.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file exists but fails to parse, or
    /// if `due_per_run` is not a valid duration string.
    pub fn load(path: &Path) -> gcse_core::Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(Error::io(path, err)),
        };
        let raw: RawConfig = toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;

        let due_per_run = parse_duration(&raw.crawler.due_per_run)
            .ok_or_else(|| Error::Config(format!("invalid due_per_run {:?}", raw.crawler.due_per_run)))?;

        Ok(Self {
            data_root: std::path::PathBuf::from(raw.back.dbroot),
            due_per_run,
            noncrawl_hosts: raw.crawler.noncrawl_hosts,
            package_partitions: raw.crawler.package_partitions,
            person_partitions: raw.crawler.person_partitions,
            max_crawl_per_site: raw.crawler.max_crawl_per_site,
            github_client_id: env_or(raw.crawler.github.client_id, "GITHUB_CLIENT_ID"),
            github_client_secret: env_or(raw.crawler.github.client_secret, "GITHUB_CLIENT_SECRET"),
            github_personal_token: env_or(
                raw.crawler.github.personal_token,
                "GITHUB_PERSONAL_ACCESS_TOKEN",
            ),
        })
    }
}

fn env_or(configured: String, var: &str) -> String {
    if configured.is_empty() {
        std::env::var(var).unwrap_or_default()
    } else {
        configured
    }
}

/// A minimal `1h`/`30m`/`90s` duration parser; `spec.md` §6.5's
/// `due_per_run` doesn't need the full breadth of a crate like
/// `humantime`, just hours/minutes/seconds suffixes.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (num, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit())?);
    let num: u64 = num.parse().ok()?;
    let secs = match unit {
        "h" => num.checked_mul(3600)?,
        "m" => num.checked_mul(60)?,
        "s" => num,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
