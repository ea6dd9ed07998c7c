//! Pipeline orchestration for Gatherbox.
//!
//! This crate ties together the listing walk, the fetch/parse worker pool
//! and the catalog consumer into two workflows: [`run_ingest`] for new
//! records and [`run_backfill`] for incomplete printings.

mod discover;
mod fetch;
pub mod pipeline;
pub mod stage;
pub mod update;

#[cfg(test)]
mod testing;

pub use pipeline::{
    ConsumerReport, DiscoveryReport, FetchReport, IngestReport, Pipeline, ProgressReporter,
    SilentProgress, run_ingest,
};
pub use stage::{StageState, StageTracker};
pub use update::{BackfillReport, run_backfill};
