//! Paginated web search.
//!
//! A [`SearchProvider`] fetches one page of organic results and reports the
//! outcome as a [`PageOutcome`]. [`fetch_all_pages`] walks successive pages
//! and decides when to stop:
//!
//! | Page outcome | Action |
//! |--------------|--------|
//! | `Hits(h)`, `h.len() >= threshold` | keep hits, request next page |
//! | `Hits(h)`, `h.len() < threshold` | keep hits, stop (last page) |
//! | `Empty` | stop |
//! | `Failed(_)` | stop, return what was gathered so far |
//!
//! Pagination also stops after `max_pages` pages, or earlier if the next
//! offset would overflow. Provider failures never
//! surface as errors to the caller; a failure on page 2 yields page 1's hits.
//!
//! [`SerperProvider`] implements the trait against the Serper.dev Google
//! Search API.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::models::RawHit;

/// Maximum number of response-body bytes kept in a failure message.
const ERROR_BODY_LIMIT: usize = 200;

/// One page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub query: &'a str,
    pub offset: u32,
    pub page_size: u32,
}

/// Outcome of fetching a single result page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Successful response with at least one hit.
    Hits(Vec<RawHit>),
    /// Successful response with no hits.
    Empty,
    /// Non-success status, transport error, or undecodable body.
    Failed(String),
}

impl PageOutcome {
    pub fn from_hits(hits: Vec<RawHit>) -> Self {
        if hits.is_empty() {
            PageOutcome::Empty
        } else {
            PageOutcome::Hits(hits)
        }
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// A page came back with fewer hits than the early-stop threshold.
    ShortPage,
    /// A page came back empty.
    Empty,
    /// The page cap was reached.
    PageCap,
    /// A page failed; results are truncated to the pages before it.
    Failed(String),
}

/// All hits gathered for one query.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<RawHit>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

impl SearchResults {
    pub fn is_truncated(&self) -> bool {
        matches!(self.stop, StopReason::Failed(_))
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page_size: u32,
    pub max_pages: u32,
    pub early_stop_threshold: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_pages: 3,
            early_stop_threshold: 5,
        }
    }
}

impl From<&SearchConfig> for Pagination {
    fn from(config: &SearchConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            early_stop_threshold: config.stop_threshold(),
        }
    }
}

/// A web search backend that returns one page of organic results per call.
///
/// Implementations must not return errors: every failure is folded into
/// [`PageOutcome::Failed`].
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short provider name for logs (e.g. `"serper"`).
    fn name(&self) -> &str;

    /// Fetch the page starting at `request.offset`.
    async fn fetch_page(&self, request: &PageRequest<'_>) -> PageOutcome;
}

/// Fetch successive pages for `query` until a stop condition is met.
pub async fn fetch_all_pages(
    provider: &dyn SearchProvider,
    query: &str,
    pagination: &Pagination,
) -> SearchResults {
    let mut hits = Vec::new();
    let mut pages_fetched = 0;

    for page in 0..pagination.max_pages {
        let Some(offset) = page.checked_mul(pagination.page_size) else {
            break;
        };
        let request = PageRequest {
            query,
            offset,
            page_size: pagination.page_size,
        };
        let outcome = provider.fetch_page(&request).await;
        pages_fetched += 1;

        let stop = match outcome {
            PageOutcome::Failed(message) => {
                tracing::warn!(
                    provider = provider.name(),
                    offset = request.offset,
                    error = %message,
                    "search page failed, truncating results"
                );
                Some(StopReason::Failed(message))
            }
            PageOutcome::Empty => Some(StopReason::Empty),
            PageOutcome::Hits(page_hits) => {
                let short = page_hits.len() < pagination.early_stop_threshold;
                hits.extend(page_hits);
                short.then_some(StopReason::ShortPage)
            }
        };

        if let Some(stop) = stop {
            return SearchResults {
                hits,
                pages_fetched,
                stop,
            };
        }
    }

    SearchResults {
        hits,
        pages_fetched,
        stop: StopReason::PageCap,
    }
}

// ============ Serper.dev ============

/// Search provider backed by the Serper.dev Google Search API.
///
/// Sends `POST {endpoint}` with `{"q", "num", "start", "gl"}` and reads the
/// `organic` array from the response.
pub struct SerperProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    locale: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<RawHit>,
}

impl SerperProvider {
    /// Build a provider with its own HTTP client using the configured timeout.
    pub fn new(api_key: String, config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, api_key, config))
    }

    pub fn with_client(client: reqwest::Client, api_key: String, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            locale: config.locale.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
    fn name(&self) -> &str {
        "serper"
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> PageOutcome {
        let body = serde_json::json!({
            "q": request.query,
            "num": request.page_size,
            "start": request.offset,
            "gl": self.locale,
        });

        let response = match self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PageOutcome::Failed(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return PageOutcome::Failed(format!(
                "Serper API error {}: {}",
                status,
                truncate(&body_text, ERROR_BODY_LIMIT)
            ));
        }

        match response.json::<SerperResponse>().await {
            Ok(parsed) => {
                tracing::debug!(
                    offset = request.offset,
                    hits = parsed.organic.len(),
                    "fetched search page"
                );
                PageOutcome::from_hits(parsed.organic)
            }
            Err(e) => PageOutcome::Failed(format!("invalid Serper response: {}", e)),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
