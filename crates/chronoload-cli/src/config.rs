//! Configuration management for chronoload
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `CHRONOLOAD_*` environment variables. Command-line flags are applied last by
//! the command handlers.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default API base URL for both query submission and archive downloads
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default number of chunks downloaded concurrently in the first batch
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Default delay before the first retry of a failed chunk
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1000;

/// Upper bound on any single backoff delay
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Total attempts per chunk URL, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between consecutive batches
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 500;

pub const DEFAULT_ROW_LIMIT: u64 = 1_000_000;

/// Connect and per-read timeout. Set to 5 minutes to accommodate slow links.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "chronoload.toml";

/// In-memory database marker understood by the ingestion sink
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the query API (`POST {api_url}/`)
    pub api_url: String,

    /// Base URL of the bulk-download API
    pub archive_url: String,

    /// DuckDB database file, or `:memory:`
    pub database: PathBuf,

    pub concurrency: usize,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_attempts: u32,
    pub batch_pause_ms: u64,
    pub row_limit: u64,
    pub timeout_secs: u64,

    /// Identifies this client to the query API; generated when absent
    pub client_id: Option<String>,

    /// Where downloaded archives are saved by default
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("chronoload"))
            .unwrap_or_else(|| PathBuf::from(".chronoload"));

        let download_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            api_url: DEFAULT_API_URL.to_string(),
            archive_url: DEFAULT_API_URL.to_string(),
            database: data_dir.join("chronoload.duckdb"),
            concurrency: DEFAULT_CONCURRENCY,
            retry_initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
            row_limit: DEFAULT_ROW_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client_id: None,
            download_dir,
        }
    }
}

impl Config {
    /// Load config from a TOML file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the effective config: explicit file, else `./chronoload.toml`
    /// when present, else defaults; environment overrides on top.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => Self::load(CONFIG_FILE_NAME)?,
            None => Self::default(),
        };

        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CHRONOLOAD_*` environment variables
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("CHRONOLOAD_API_URL") {
            self.api_url = url;
        }
        if let Ok(url) = std::env::var("CHRONOLOAD_ARCHIVE_URL") {
            self.archive_url = url;
        }
        if let Ok(db) = std::env::var("CHRONOLOAD_DATABASE") {
            self.database = PathBuf::from(db);
        }
        if let Ok(dir) = std::env::var("CHRONOLOAD_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Ok(id) = std::env::var("CHRONOLOAD_CLIENT_ID") {
            self.client_id = Some(id);
        }

        self.concurrency = env_number("CHRONOLOAD_CONCURRENCY", self.concurrency)?;
        self.retry_initial_delay_ms =
            env_number("CHRONOLOAD_RETRY_DELAY_MS", self.retry_initial_delay_ms)?;
        self.retry_max_delay_ms =
            env_number("CHRONOLOAD_RETRY_MAX_DELAY_MS", self.retry_max_delay_ms)?;
        self.max_attempts = env_number("CHRONOLOAD_MAX_ATTEMPTS", self.max_attempts)?;
        self.batch_pause_ms = env_number("CHRONOLOAD_BATCH_PAUSE_MS", self.batch_pause_ms)?;
        self.row_limit = env_number("CHRONOLOAD_ROW_LIMIT", self.row_limit)?;
        self.timeout_secs = env_number("CHRONOLOAD_TIMEOUT_SECS", self.timeout_secs)?;

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(PipelineError::config("api_url must not be empty"));
        }
        if self.archive_url.trim().is_empty() {
            return Err(PipelineError::config("archive_url must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::config("concurrency must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(PipelineError::config("max_attempts must be at least 1"));
        }
        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            return Err(PipelineError::config(
                "retry_max_delay_ms must not be smaller than retry_initial_delay_ms",
            ));
        }
        Ok(())
    }

    /// Client id sent with every query, generating one for this process if unset
    pub fn client_id(&mut self) -> String {
        self.client_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.as_os_str() == IN_MEMORY_DATABASE
    }
}

fn env_number<T: std::str::FromStr>(key: &str, current: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::config(format!("{} must be a number, got '{}'", key, raw))),
        Err(_) => Ok(current),
    }
}
