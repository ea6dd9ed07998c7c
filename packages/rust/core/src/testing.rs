//! In-memory source and a minimal extractor for pipeline tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatherbox_crawler::{RecordExtractor, Source};
use gatherbox_shared::{ExternalId, GatherError, IngestConfig, Printing, Record, Result};
use gatherbox_soup::{Node, Selector, find, flatten_text};

pub(crate) fn test_config() -> IngestConfig {
    IngestConfig {
        workers: 4,
        fetch_queue_capacity: 8,
        record_queue_capacity: 8,
        checkpoint_every: 1000,
        fetch_timeout: Duration::from_secs(5),
        page_size: 100,
    }
}

pub(crate) fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gatherbox-core-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// A listing page in the shape the discovery parser expects.
pub(crate) fn listing_page(total: Option<usize>, entries: &[(&str, u64)]) -> String {
    let header = match total {
        Some(n) => format!(
            r#"<span id="ctl00_ctl00_ctl00_MainContent_SubContent_SubContentHeader_searchTermDisplay">Search: all ({n})</span>"#
        ),
        None => String::new(),
    };
    let rows: String = entries
        .iter()
        .map(|(name, id)| {
            format!(
                r#"<tr class="cardItem"><td class="name"><a href="../Card/Details.aspx?multiverseid={id}">{name}</a></td></tr>"#
            )
        })
        .collect();
    format!("<html><body>{header}<table>{rows}</table></body></html>")
}

/// A detail page understood by [`TestExtractor`].
pub(crate) fn card_page(name: &str, set: &str) -> String {
    format!(r#"<html><body><h1>{name}</h1><span class="set">{set}</span></body></html>"#)
}

#[derive(Default)]
pub(crate) struct FakeSource {
    listings: HashMap<usize, String>,
    details: HashMap<ExternalId, String>,
    delays: HashMap<ExternalId, Duration>,
    listing_calls: Mutex<Vec<usize>>,
    detail_calls: Mutex<Vec<ExternalId>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn listing(mut self, page: usize, body: impl Into<String>) -> Self {
        self.listings.insert(page, body.into());
        self
    }

    pub(crate) fn detail(mut self, id: u64, body: impl Into<String>) -> Self {
        self.details.insert(ExternalId(id), body.into());
        self
    }

    pub(crate) fn delay(mut self, id: u64, by: Duration) -> Self {
        self.delays.insert(ExternalId(id), by);
        self
    }

    pub(crate) fn listing_calls(&self) -> Vec<usize> {
        self.listing_calls.lock().expect("lock").clone()
    }

    /// Detail requests, sorted.
    pub(crate) fn detail_calls(&self) -> Vec<ExternalId> {
        let mut calls = self.detail_calls.lock().expect("lock").clone();
        calls.sort_unstable();
        calls
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn fetch_listing(&self, page: usize) -> Result<String> {
        self.listing_calls.lock().expect("lock").push(page);
        self.listings
            .get(&page)
            .cloned()
            .ok_or_else(|| GatherError::Network(format!("listing page {page}: 404")))
    }

    async fn fetch_detail(&self, id: ExternalId) -> Result<String> {
        self.detail_calls.lock().expect("lock").push(id);
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        self.details
            .get(&id)
            .cloned()
            .ok_or_else(|| GatherError::Network(format!("detail {id}: 404")))
    }
}

static NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("name selector"));
static SET: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".set").expect("set selector"));

/// One record per page: `<h1>` is the name, `.set` the printing's set.
pub(crate) struct TestExtractor;

impl RecordExtractor for TestExtractor {
    fn extract(&self, doc: &Node, requested: ExternalId) -> Result<Vec<Record>> {
        let text = |sel: &Selector| {
            find(doc, sel)
                .map(|n| flatten_text(n).trim().to_string())
                .unwrap_or_default()
        };
        let printing = Printing {
            set: text(&SET),
            ..Printing::stub(requested)
        };
        Ok(vec![Record::named(text(&NAME)).with_printing(printing)])
    }

    fn name(&self) -> &str {
        "test"
    }
}
