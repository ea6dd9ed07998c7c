//! Remote source transport.
//!
//! [`Source`] is the seam between the pipeline and the network: the
//! pipeline asks for listing pages and detail pages by number and id, and
//! receives raw markup. [`HttpSource`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use gatherbox_shared::{ExternalId, GatherError, Result, SourceConfig};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("Gatherbox/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow per request.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A paged listing plus per-item detail pages.
#[async_trait]
pub trait Source: Send + Sync {
    /// Markup of listing page `page` (zero-based).
    async fn fetch_listing(&self, page: usize) -> Result<String>;

    /// Markup of the detail page for `id`.
    async fn fetch_detail(&self, id: ExternalId) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

/// [`Source`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    listing_url: String,
    detail_url: String,
    timeout_secs: u64,
}

impl HttpSource {
    /// Build a source from the `[source]` config section.
    ///
    /// Both URL templates are validated up front.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        for (key, value) in [
            ("listing_url", &config.listing_url),
            ("detail_url", &config.detail_url),
        ] {
            Url::parse(value)
                .map_err(|e| GatherError::config(format!("invalid {key} {value:?}: {e}")))?;
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            listing_url: config.listing_url.clone(),
            detail_url: config.detail_url.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn get(&self, url: &str) -> Result<String> {
        debug!(%url, "fetching");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                GatherError::Timeout {
                    target: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                GatherError::Network(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatherError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| GatherError::Network(format!("{url}: failed to read body: {e}")))
    }
}

#[async_trait]
impl Source for HttpSource {
    #[instrument(skip(self))]
    async fn fetch_listing(&self, page: usize) -> Result<String> {
        self.get(&with_query(&self.listing_url, "page", page)).await
    }

    #[instrument(skip(self, id), fields(id = %id))]
    async fn fetch_detail(&self, id: ExternalId) -> Result<String> {
        self.get(&with_query(&self.detail_url, "multiverseid", id))
            .await
    }
}

/// Append `key=value` to a URL template, keeping the template's own query
/// string byte-for-byte.
fn with_query(base: &str, key: &str, value: impl std::fmt::Display) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{key}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SourceConfig {
        SourceConfig {
            listing_url: format!("{}/search?output=compact", server.uri()),
            detail_url: format!("{}/details", server.uri()),
            request_timeout_secs: 5,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn with_query_appends() {
        assert_eq!(with_query("http://x/a", "page", 2), "http://x/a?page=2");
        assert_eq!(
            with_query("http://x/a?cmc=|>%3d[0]", "page", 0),
            "http://x/a?cmc=|>%3d[0]&page=0"
        );
    }

    #[test]
    fn rejects_invalid_urls() {
        let config = SourceConfig {
            detail_url: "not a url".into(),
            ..SourceConfig::default()
        };
        let err = HttpSource::new(&config).unwrap_err();
        assert!(matches!(err, GatherError::Config { .. }));
    }

    #[tokio::test]
    async fn fetches_listing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("output", "compact"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>page 3</html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).expect("source");
        let body = source.fetch_listing(3).await.expect("listing");
        assert_eq!(body, "<html>page 3</html>");
    }

    #[tokio::test]
    async fn fetches_detail_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details"))
            .and(query_param("multiverseid", "191087"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>card</html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).expect("source");
        let body = source.fetch_detail(ExternalId(191087)).await.expect("detail");
        assert!(body.contains("card"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).expect("source");
        let err = source.fetch_detail(ExternalId(1)).await.unwrap_err();
        assert!(matches!(err, GatherError::Network(ref msg) if msg.contains("503")));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = SourceConfig {
            request_timeout_secs: 1,
            ..config_for(&server)
        };
        let source = HttpSource::new(&config).expect("source");
        let err = source.fetch_listing(0).await.unwrap_err();
        assert!(matches!(err, GatherError::Timeout { secs: 1, .. }));
    }
}
