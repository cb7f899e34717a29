//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! [store]
//! path = "vetshelf.sqlite"
//!
//! [search]
//! snapshot_path = "search-index.json"
//! result_limit = 50
//! upcoming_limit = 50
//! timeout_ms = 30000
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on full-text and upcoming result sets.
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Well-known storage key of the persisted search index.
pub const DEFAULT_SNAPSHOT_NAME: &str = "search-index.json";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// SQLite file. `None` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_result_limit")]
    pub upcoming_limit: usize,
    /// Worker reply timeout in milliseconds; `0` waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            result_limit: DEFAULT_RESULT_LIMIT,
            upcoming_limit: DEFAULT_RESULT_LIMIT,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_NAME)
}
fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}
fn default_timeout_ms() -> u64 {
    30_000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        if config.search.result_limit == 0 || config.search.upcoming_limit == 0 {
            anyhow::bail!("search result limits must be greater than zero");
        }
        Ok(config)
    }

    /// In-memory store with the search snapshot kept under `dir`.
    pub fn in_memory(dir: &Path) -> Config {
        Config {
            store: StoreConfig { path: None },
            search: SearchConfig {
                snapshot_path: dir.join(DEFAULT_SNAPSHOT_NAME),
                ..SearchConfig::default()
            },
        }
    }
}
