//! Shared types, error model, and configuration for Gatherbox.
//!
//! This crate is the foundation depended on by all other Gatherbox crates.
//! It provides:
//! - [`GatherError`] — the unified error type
//! - Domain types ([`Record`], [`Printing`], [`ExternalId`], [`RunId`])
//! - Configuration ([`AppConfig`], [`IngestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, IngestConfig, PipelineConfig, SourceConfig, config_dir, config_file_path,
    load_config, load_config_from,
};
pub use error::{GatherError, Result};
pub use types::{ExternalId, LayoutKind, Printing, Record, RunId, Special, identity_for};
