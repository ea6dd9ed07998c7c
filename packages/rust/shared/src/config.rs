//! Application configuration for Gatherbox.
//!
//! User config lives at `~/.gatherbox/gatherbox.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "gatherbox.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".gatherbox";

// ---------------------------------------------------------------------------
// Config structs (matching gatherbox.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline sizing and cadence.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Remote source endpoints.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fetch/parse workers for the ingest run.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fetch/parse workers for the backfill sweep.
    #[serde(default = "default_backfill_workers")]
    pub backfill_workers: usize,

    /// Capacity of the queue between discovery and the workers.
    #[serde(default = "default_fetch_queue_capacity")]
    pub fetch_queue_capacity: usize,

    /// Capacity of the queue between the workers and the catalog consumer.
    #[serde(default = "default_record_queue_capacity")]
    pub record_queue_capacity: usize,

    /// Write a checkpoint after this many successful additions.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// Per-item fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            backfill_workers: default_backfill_workers(),
            fetch_queue_capacity: default_fetch_queue_capacity(),
            record_queue_capacity: default_record_queue_capacity(),
            checkpoint_every: default_checkpoint_every(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_workers() -> usize {
    100
}
fn default_backfill_workers() -> usize {
    50
}
fn default_fetch_queue_capacity() -> usize {
    1024
}
fn default_record_queue_capacity() -> usize {
    256
}
fn default_checkpoint_every() -> usize {
    1000
}
fn default_fetch_timeout() -> u64 {
    30
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Paged search listing; the page number is appended as `page=N`.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Detail page; the id is appended as `multiverseid=N`.
    #[serde(default = "default_detail_url")]
    pub detail_url: String,

    /// Number of candidates the listing returns per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            detail_url: default_detail_url(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_listing_url() -> String {
    "https://gatherer.wizards.com/Pages/Search/Default.aspx?output=compact&action=advanced&special=true&cmc=|>%3d[0]|<%3d[0]".into()
}
fn default_detail_url() -> String {
    "https://gatherer.wizards.com/Pages/Card/Details.aspx".into()
}
fn default_page_size() -> usize {
    100
}
fn default_request_timeout() -> u64 {
    20
}

// ---------------------------------------------------------------------------
// Ingest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Fetch/parse workers.
    pub workers: usize,
    /// Fetch queue capacity.
    pub fetch_queue_capacity: usize,
    /// Record queue capacity.
    pub record_queue_capacity: usize,
    /// Checkpoint cadence in successful additions.
    pub checkpoint_every: usize,
    /// Per-item fetch timeout.
    pub fetch_timeout: Duration,
    /// Listing page size used to turn a result count into a page count.
    pub page_size: usize,
}

impl IngestConfig {
    /// The same pipeline sized for the backfill sweep.
    pub fn for_backfill(config: &AppConfig) -> Self {
        Self {
            workers: config.pipeline.backfill_workers,
            ..Self::from(config)
        }
    }

    /// Reject settings that would stall or spin the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(GatherError::config("workers must be at least 1"));
        }
        if self.fetch_queue_capacity == 0 || self.record_queue_capacity == 0 {
            return Err(GatherError::config("queue capacities must be at least 1"));
        }
        if self.checkpoint_every == 0 {
            return Err(GatherError::config("checkpoint_every must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(GatherError::config("page_size must be at least 1"));
        }
        Ok(())
    }
}

impl From<&AppConfig> for IngestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            workers: config.pipeline.workers,
            fetch_queue_capacity: config.pipeline.fetch_queue_capacity,
            record_queue_capacity: config.pipeline.record_queue_capacity,
            checkpoint_every: config.pipeline.checkpoint_every,
            fetch_timeout: Duration::from_secs(config.pipeline.fetch_timeout_secs),
            page_size: config.source.page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.gatherbox/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GatherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.gatherbox/gatherbox.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GatherError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GatherError::config(format!("failed to parse {}: {e}", path.display())))
}
