//! Backfill sweep: re-fetch printings whose descriptive fields are unknown.
//!
//! Cross-referenced printings enter the catalog as stubs carrying only an
//! id. The sweep feeds those ids through the same worker pool and consumer
//! as an ingest run; the fill-empty merge completes the stubs in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gatherbox_shared::{ExternalId, Result, RunId};
use gatherbox_storage::Catalog;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, instrument};

use crate::pipeline::{ConsumerReport, FetchReport, Pipeline, ProgressReporter, joined};

/// Summary of one backfill sweep.
#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub run_id: RunId,
    /// Incomplete printings found when the sweep started.
    pub pending: usize,
    /// Ids handed to the worker pool.
    pub enqueued: usize,
    /// Incomplete printings left afterwards.
    pub remaining: usize,
    pub fetch: FetchReport,
    pub consumer: ConsumerReport,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Re-fetch every incomplete printing in `catalog`.
///
/// With nothing to do the catalog is returned untouched and no checkpoint
/// is written.
pub async fn run_backfill(
    pipeline: &Pipeline,
    catalog: Catalog,
    progress: Arc<dyn ProgressReporter>,
) -> Result<(Catalog, BackfillReport)> {
    pipeline.config.validate()?;
    backfill(pipeline, catalog, progress, RunId::new()).await
}

#[instrument(name = "backfill", skip_all, fields(run_id = %run_id))]
async fn backfill(
    pipeline: &Pipeline,
    catalog: Catalog,
    progress: Arc<dyn ProgressReporter>,
    run_id: RunId,
) -> Result<(Catalog, BackfillReport)> {
    let start = Instant::now();
    let worklist = catalog.incomplete_printings();
    let pending = worklist.len();

    if pending == 0 {
        info!("no incomplete printings, nothing to backfill");
        let report = BackfillReport {
            run_id,
            pending,
            enqueued: 0,
            remaining: 0,
            fetch: FetchReport::default(),
            consumer: ConsumerReport::default(),
            cancelled: pipeline.cancel.is_cancelled(),
            elapsed: start.elapsed(),
        };
        return Ok((catalog, report));
    }

    info!(pending, workers = pipeline.config.workers, "starting backfill");
    progress.phase("Backfilling");

    let (fetch_tx, fetch_rx) = mpsc::channel(pipeline.config.fetch_queue_capacity);
    let feeder = tokio::spawn(
        feed(worklist, fetch_tx, pipeline.cancel.clone(), Arc::clone(&progress)).in_current_span(),
    );
    let (fetch, consumer) = pipeline.spawn_fetch_and_consume(catalog, fetch_rx, &progress);

    let (feeder, fetch, consumer) = tokio::join!(feeder, fetch, consumer);
    let (catalog, consumer) = joined(consumer)?;
    let enqueued = joined(feeder.map(Ok))?;
    let fetch = joined(fetch)?;

    let report = BackfillReport {
        run_id,
        pending,
        enqueued,
        remaining: catalog.incomplete_printings().len(),
        fetch,
        consumer,
        cancelled: pipeline.cancel.is_cancelled(),
        elapsed: start.elapsed(),
    };

    info!(
        pending,
        enqueued = report.enqueued,
        remaining = report.remaining,
        fetched = report.fetch.fetched,
        failed = report.fetch.failed,
        merged = report.consumer.merged,
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed.as_millis(),
        "backfill complete"
    );

    Ok((catalog, report))
}

/// Push the worklist into the fetch queue; the queue closes on return.
async fn feed(
    worklist: Vec<ExternalId>,
    queue: mpsc::Sender<ExternalId>,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
) -> usize {
    let mut enqueued = 0;
    for id in worklist {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = queue.send(id) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        enqueued += 1;
        progress.work_enqueued(enqueued);
    }
    enqueued
}
