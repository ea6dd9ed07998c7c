//! Fetch/parse worker pool and the single catalog consumer.
//!
//! Both the ingest run and the backfill sweep feed ids into a fetch queue;
//! everything from there to the checkpoint on disk is shared.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gatherbox_crawler::{RecordExtractor, Source};
use gatherbox_shared::{ExternalId, GatherError, Record, Result};
use gatherbox_soup::parse_document;
use gatherbox_storage::{AddOutcome, Catalog};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::pipeline::{ConsumerReport, FetchReport, ProgressReporter};
use crate::stage::{StageState, StageTracker};

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Shared by every worker of one pool.
pub(crate) struct FetchContext {
    pub source: Arc<dyn Source>,
    pub extractor: Arc<dyn RecordExtractor>,
    pub fetch_timeout: Duration,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressReporter>,
    pub tracker: StageTracker,
}

/// Run `workers` fetch/parse workers until the fetch queue closes or the run
/// is cancelled, then close the record queue.
///
/// The record queue closes when the last sender drops, which happens only
/// after every worker has been joined here.
#[instrument(name = "fetch", skip_all, fields(workers = workers))]
pub(crate) async fn run_pool(
    ctx: FetchContext,
    workers: usize,
    queue: mpsc::Receiver<ExternalId>,
    records: mpsc::Sender<Record>,
) -> Result<FetchReport> {
    debug!(extractor = ctx.extractor.name(), "fetch stage started");
    let ctx = Arc::new(ctx);
    let queue = Arc::new(Mutex::new(queue));

    let mut set = JoinSet::new();
    for worker in 0..workers {
        let ctx = Arc::clone(&ctx);
        let queue = Arc::clone(&queue);
        let records = records.clone();
        set.spawn(
            async move { run_worker(&ctx, &queue, &records).await }
                .instrument(tracing::debug_span!("worker", worker)),
        );
    }
    drop(records);

    let mut report = FetchReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(worker_report) => report.absorb(&worker_report),
            Err(e) => {
                // a worker panic loses at most the item it held
                warn!(error = %e, "fetch worker failed");
                report.failed += 1;
            }
        }
    }

    ctx.tracker.advance(StageState::Closed);
    info!(
        fetched = report.fetched,
        failed = report.failed,
        records = report.records,
        dropped_unnamed = report.dropped_unnamed,
        "fetch stage closed"
    );
    Ok(report)
}

async fn run_worker(
    ctx: &FetchContext,
    queue: &Mutex<mpsc::Receiver<ExternalId>>,
    records: &mpsc::Sender<Record>,
) -> FetchReport {
    let mut report = FetchReport::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            id = async { queue.lock().await.recv().await } => id,
        };
        let Some(id) = next else {
            ctx.tracker.advance(StageState::Draining);
            break;
        };

        match fetch_one(ctx, id).await {
            Ok(extracted) => {
                report.fetched += 1;
                ctx.progress.item_fetched(id, true);
                for record in extracted {
                    if record.name.trim().is_empty() {
                        warn!(%id, "dropping record without a name");
                        report.dropped_unnamed += 1;
                        continue;
                    }
                    if records.send(record).await.is_err() {
                        warn!("record queue closed, stopping worker");
                        ctx.tracker.advance(StageState::Draining);
                        return report;
                    }
                    report.records += 1;
                }
            }
            Err(e) => {
                warn!(%id, error = %e, "fetch failed, skipping");
                report.failed += 1;
                ctx.progress.item_fetched(id, false);
            }
        }
    }

    report
}

/// Fetch, parse and extract one item.
async fn fetch_one(ctx: &FetchContext, id: ExternalId) -> Result<Vec<Record>> {
    let body = tokio::time::timeout(ctx.fetch_timeout, ctx.source.fetch_detail(id))
        .await
        .map_err(|_| GatherError::Timeout {
            target: format!("detail {id}"),
            secs: ctx.fetch_timeout.as_secs(),
        })??;

    let extractor = Arc::clone(&ctx.extractor);
    tokio::task::spawn_blocking(move || {
        let doc = parse_document(&body)?;
        extractor.extract(&doc, id)
    })
    .await
    .map_err(|e| GatherError::Extraction(format!("extractor for {id} did not finish: {e}")))?
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Sole owner of the catalog while a run is in progress.
pub(crate) struct Consumer {
    pub catalog: Catalog,
    pub checkpoint_path: PathBuf,
    pub checkpoint_every: usize,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressReporter>,
}

impl Consumer {
    /// Merge records until the record queue closes, checkpointing every
    /// `checkpoint_every` effective additions and once at the end.
    ///
    /// The queue is always drained, even after cancellation. A failed
    /// checkpoint is fatal and cancels the run.
    #[instrument(name = "consumer", skip_all)]
    pub(crate) async fn run(
        mut self,
        mut records: mpsc::Receiver<Record>,
    ) -> Result<(Catalog, ConsumerReport)> {
        let tracker = StageTracker::new("consumer");
        let mut report = ConsumerReport::default();
        let mut since_checkpoint = 0usize;

        while let Some(record) = records.recv().await {
            let name = record.name.clone();
            match self.catalog.add(record) {
                Ok(AddOutcome::Inserted) => {
                    debug!(%name, "inserted");
                    report.inserted += 1;
                    since_checkpoint += 1;
                }
                Ok(AddOutcome::Merged {
                    new_printings,
                    updated,
                }) => {
                    debug!(%name, new_printings, updated, "merged");
                    report.merged += 1;
                    since_checkpoint += 1;
                }
                Ok(AddOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    warn!(error = %e, "rejected record");
                    report.rejected += 1;
                }
            }

            if since_checkpoint >= self.checkpoint_every {
                self.write_checkpoint(&mut report)?;
                since_checkpoint = 0;
            }
        }

        tracker.advance(StageState::Draining);
        self.write_checkpoint(&mut report)?;
        tracker.advance(StageState::Closed);

        info!(
            inserted = report.inserted,
            merged = report.merged,
            unchanged = report.unchanged,
            rejected = report.rejected,
            checkpoints = report.checkpoints,
            records = self.catalog.len(),
            "consumer closed"
        );
        Ok((self.catalog, report))
    }

    fn write_checkpoint(&self, report: &mut ConsumerReport) -> Result<()> {
        match self.catalog.checkpoint(&self.checkpoint_path) {
            Ok(written) => {
                report.checkpoints += 1;
                info!(records = written, path = %self.checkpoint_path.display(), "checkpoint written");
                self.progress.checkpoint_written(written);
                Ok(())
            }
            Err(e) => {
                self.cancel.cancel();
                Err(e)
            }
        }
    }
}
