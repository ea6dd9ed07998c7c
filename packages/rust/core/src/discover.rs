//! Discovery stage: walk the paged listing and enqueue unknown work.

use std::collections::HashSet;
use std::sync::Arc;

use gatherbox_crawler::Source;
use gatherbox_discovery::{Listing, page_count, parse_listing};
use gatherbox_shared::{ExternalId, GatherError, Result};
use gatherbox_soup::parse_document;
use gatherbox_storage::Known;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::{DiscoveryReport, ProgressReporter};
use crate::stage::{StageState, StageTracker};

/// Everything the discovery task owns.
pub(crate) struct Discovery {
    pub source: Arc<dyn Source>,
    pub known: Known,
    pub page_size: usize,
    pub queue: mpsc::Sender<ExternalId>,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressReporter>,
}

/// Whether the stage should keep walking pages.
enum Flow {
    Continue,
    Stop,
}

impl Discovery {
    /// Run to completion. The fetch queue closes when this returns.
    ///
    /// Failing to read the first page or its result count is fatal and
    /// cancels the run; a failing later page is skipped.
    #[instrument(name = "discovery", skip_all)]
    pub(crate) async fn run(self) -> Result<DiscoveryReport> {
        let tracker = StageTracker::new("discovery");
        let result = self.walk().await;
        if result.is_err() {
            self.cancel.cancel();
        }
        tracker.advance(StageState::Closed);
        result
    }

    async fn walk(&self) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        let mut seen = Seen::default();

        let first = self
            .fetch_page(0)
            .await
            .map_err(|e| GatherError::Discovery(format!("first listing page: {e}")))?;
        let total = first
            .total
            .ok_or_else(|| GatherError::Discovery("listing reports no result count".into()))?;

        report.pages = page_count(total, self.page_size);
        info!(total, pages = report.pages, "discovery started");

        if report.pages > 0 {
            report.pages_fetched += 1;
            if let Flow::Stop = self.enqueue(first, &mut seen, &mut report).await {
                return Ok(report);
            }
        }

        for page in 1..report.pages {
            if self.cancel.is_cancelled() {
                info!(page, "discovery cancelled");
                break;
            }
            match self.fetch_page(page).await {
                Ok(listing) => {
                    report.pages_fetched += 1;
                    if let Flow::Stop = self.enqueue(listing, &mut seen, &mut report).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(page, error = %e, "listing page failed, skipping");
                    report.pages_failed += 1;
                }
            }
        }

        info!(
            pages_fetched = report.pages_fetched,
            pages_failed = report.pages_failed,
            candidates = report.candidates,
            skipped = report.skipped,
            enqueued = report.enqueued,
            "discovery complete"
        );
        Ok(report)
    }

    async fn fetch_page(&self, page: usize) -> Result<Listing> {
        let body = self.source.fetch_listing(page).await?;
        tokio::task::spawn_blocking(move || {
            let doc = parse_document(&body)?;
            parse_listing(&doc)
        })
        .await
        .map_err(|e| GatherError::Task(format!("listing parser: {e}")))?
    }

    async fn enqueue(
        &self,
        listing: Listing,
        seen: &mut Seen,
        report: &mut DiscoveryReport,
    ) -> Flow {
        for candidate in listing.candidates {
            report.candidates += 1;
            let known = self.known.identities.contains(&candidate.identity)
                || self.known.external_ids.contains(&candidate.external_id);
            if known || !seen.insert(&candidate.identity, candidate.external_id) {
                debug!(name = %candidate.name, id = %candidate.external_id, "already known");
                report.skipped += 1;
                continue;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Flow::Stop,
                sent = self.queue.send(candidate.external_id) => {
                    if sent.is_err() {
                        warn!("fetch queue closed, stopping discovery");
                        return Flow::Stop;
                    }
                }
            }
            report.enqueued += 1;
            self.progress.work_enqueued(report.enqueued);
        }
        Flow::Continue
    }
}

/// Work already enqueued during this run.
#[derive(Default)]
struct Seen {
    identities: HashSet<String>,
    external_ids: HashSet<ExternalId>,
}

impl Seen {
    /// Record a candidate; `false` if either key was already seen.
    fn insert(&mut self, identity: &str, id: ExternalId) -> bool {
        if self.identities.contains(identity) || self.external_ids.contains(&id) {
            return false;
        }
        self.identities.insert(identity.to_string());
        self.external_ids.insert(id);
        true
    }
}
