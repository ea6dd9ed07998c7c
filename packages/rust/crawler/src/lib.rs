//! Remote source transport and record extraction.
//!
//! This crate provides:
//! - [`source`] — the [`Source`] seam and its HTTP implementation
//! - [`adapters`] — [`RecordExtractor`] implementations that turn detail
//!   documents into records

pub mod adapters;
pub mod source;

pub use adapters::{GathererExtractor, RecordExtractor, mana_symbols};
pub use source::{HttpSource, Source};
