//! Ingest pipeline: discovery → fetch/parse pool → catalog consumer.
//!
//! Stages run as separate tasks joined by bounded queues. A full queue
//! suspends its producer, so memory stays bounded however fast discovery
//! runs. The catalog moves into the consumer task at the start of a run and
//! is handed back at the end; no other task can reach it in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gatherbox_crawler::{RecordExtractor, Source};
use gatherbox_shared::{ExternalId, GatherError, IngestConfig, Result, RunId};
use gatherbox_storage::Catalog;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, instrument};

use crate::discover::Discovery;
use crate::fetch::{Consumer, FetchContext, run_pool};
use crate::stage::StageTracker;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callbacks, invoked from several tasks concurrently.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called each time discovery enqueues an item; `total` is the running count.
    fn work_enqueued(&self, total: usize);
    /// Called after each fetch attempt.
    fn item_fetched(&self, id: ExternalId, succeeded: bool);
    /// Called after each checkpoint write.
    fn checkpoint_written(&self, records: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn work_enqueued(&self, _total: usize) {}
    fn item_fetched(&self, _id: ExternalId, _succeeded: bool) {}
    fn checkpoint_written(&self, _records: usize) {}
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Discovery stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Pages implied by the result count.
    pub pages: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub candidates: usize,
    /// Candidates already in the catalog or already enqueued.
    pub skipped: usize,
    pub enqueued: usize,
}

/// Fetch/parse stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub fetched: usize,
    /// Fetch, timeout, parse and extraction failures.
    pub failed: usize,
    /// Records forwarded to the consumer.
    pub records: usize,
    pub dropped_unnamed: usize,
}

impl FetchReport {
    pub(crate) fn absorb(&mut self, other: &FetchReport) {
        self.fetched += other.fetched;
        self.failed += other.failed;
        self.records += other.records;
        self.dropped_unnamed += other.dropped_unnamed;
    }
}

/// Consumer stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub inserted: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub checkpoints: usize,
}

/// Summary of one ingest run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: RunId,
    pub discovery: DiscoveryReport,
    pub fetch: FetchReport,
    pub consumer: ConsumerReport,
    /// The run was cancelled before discovery finished.
    pub cancelled: bool,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Collaborators and settings shared by the ingest run and the backfill sweep.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) extractor: Arc<dyn RecordExtractor>,
    pub(crate) config: IngestConfig,
    pub(crate) checkpoint_path: PathBuf,
    pub(crate) cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn Source>,
        extractor: Arc<dyn RecordExtractor>,
        config: IngestConfig,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            extractor,
            config,
            checkpoint_path: checkpoint_path.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. tied to Ctrl-C).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The same pipeline with different sizing.
    pub fn with_config(&self, config: IngestConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Spawn the worker pool and the consumer behind a fetch queue.
    pub(crate) fn spawn_fetch_and_consume(
        &self,
        catalog: Catalog,
        queue: mpsc::Receiver<ExternalId>,
        progress: &Arc<dyn ProgressReporter>,
    ) -> (
        JoinHandle<Result<FetchReport>>,
        JoinHandle<Result<(Catalog, ConsumerReport)>>,
    ) {
        let (record_tx, record_rx) = mpsc::channel(self.config.record_queue_capacity);

        let ctx = FetchContext {
            source: Arc::clone(&self.source),
            extractor: Arc::clone(&self.extractor),
            fetch_timeout: self.config.fetch_timeout,
            cancel: self.cancel.clone(),
            progress: Arc::clone(progress),
            tracker: StageTracker::new("fetch"),
        };
        let fetch = tokio::spawn(
            run_pool(ctx, self.config.workers, queue, record_tx).in_current_span(),
        );

        let consumer = Consumer {
            catalog,
            checkpoint_path: self.checkpoint_path.clone(),
            checkpoint_every: self.config.checkpoint_every,
            cancel: self.cancel.clone(),
            progress: Arc::clone(progress),
        };
        let consumer = tokio::spawn(consumer.run(record_rx).in_current_span());

        (fetch, consumer)
    }
}

/// Flatten a joined stage result; a panicked stage is a task error.
pub(crate) fn joined<T>(result: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    result.map_err(|e| GatherError::Task(format!("pipeline stage failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Discover unknown records, fetch them and merge them into `catalog`.
///
/// Returns the updated catalog once every stage has closed and the final
/// checkpoint is written. Fatal errors (no result count, a failed
/// checkpoint, a panicked stage) abort the run; per-item failures are
/// counted in the report.
pub async fn run_ingest(
    pipeline: &Pipeline,
    catalog: Catalog,
    progress: Arc<dyn ProgressReporter>,
) -> Result<(Catalog, IngestReport)> {
    pipeline.config.validate()?;
    ingest(pipeline, catalog, progress, RunId::new()).await
}

#[instrument(name = "ingest", skip_all, fields(run_id = %run_id))]
async fn ingest(
    pipeline: &Pipeline,
    catalog: Catalog,
    progress: Arc<dyn ProgressReporter>,
    run_id: RunId,
) -> Result<(Catalog, IngestReport)> {
    let start = Instant::now();
    let config = &pipeline.config;

    info!(
        records = catalog.len(),
        printings = catalog.printing_count(),
        workers = config.workers,
        checkpoint = %pipeline.checkpoint_path.display(),
        "starting ingest"
    );
    progress.phase("Ingesting");

    let (fetch_tx, fetch_rx) = mpsc::channel(config.fetch_queue_capacity);
    let discovery = Discovery {
        source: Arc::clone(&pipeline.source),
        known: catalog.known(),
        page_size: config.page_size,
        queue: fetch_tx,
        cancel: pipeline.cancel.clone(),
        progress: Arc::clone(&progress),
    };
    let discovery = tokio::spawn(discovery.run().in_current_span());
    let (fetch, consumer) = pipeline.spawn_fetch_and_consume(catalog, fetch_rx, &progress);

    let (discovery, fetch, consumer) = tokio::join!(discovery, fetch, consumer);
    let (catalog, consumer) = joined(consumer)?;
    let discovery = joined(discovery)?;
    let fetch = joined(fetch)?;

    let report = IngestReport {
        run_id,
        discovery,
        fetch,
        consumer,
        cancelled: pipeline.cancel.is_cancelled(),
        elapsed: start.elapsed(),
    };

    info!(
        records = catalog.len(),
        enqueued = report.discovery.enqueued,
        fetched = report.fetch.fetched,
        failed = report.fetch.failed,
        inserted = report.consumer.inserted,
        merged = report.consumer.merged,
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed.as_millis(),
        "ingest complete"
    );

    Ok((catalog, report))
}
