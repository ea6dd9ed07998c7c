//! Record extractors: turn a parsed detail document into records.
//!
//! An extractor owns the field rules for one page layout family. It reads
//! the document through the selector engine only and never performs I/O, so
//! it can run on the blocking pool inside a fetch worker.

mod gatherer;
mod symbols;

use gatherbox_shared::{ExternalId, Record, Result};
use gatherbox_soup::Node;

pub use gatherer::GathererExtractor;
pub use symbols::mana_symbols;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Field-extraction rules for one kind of detail document.
pub trait RecordExtractor: Send + Sync {
    /// Extract the records described by `doc`, fetched for `requested`.
    ///
    /// Returns one record for a single layout and two for a linked pair.
    /// A record with an empty name may be returned; the caller drops it.
    fn extract(&self, doc: &Node, requested: ExternalId) -> Result<Vec<Record>>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}
