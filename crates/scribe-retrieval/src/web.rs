//! Web search client
//!
//! - [`WebSearchClient`]: the seam to an external search API
//! - [`HttpWebSearchClient`]: JSON-over-HTTP implementation using `reqwest`
//! - [`CachedWebSearch`]: TTL cache in front of any client
//! - [`search_bounded`]: the call the retriever makes; never fails except on
//!   caller cancellation, and gives up after its timeout

use crate::error::RetrievalError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use scribe_types::WebResult;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lower bound of the web search timeout
pub const MIN_WEB_TIMEOUT: Duration = Duration::from_millis(3500);

/// Upper bound of the web search timeout
pub const MAX_WEB_TIMEOUT: Duration = Duration::from_millis(5000);

/// Clamp a timeout into the accepted web search window
#[inline]
#[must_use]
pub fn clamp_web_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_WEB_TIMEOUT, MAX_WEB_TIMEOUT)
}

/// Options for one web search call
#[derive(Debug, Clone)]
pub struct WebSearchOptions {
    /// Maximum number of results
    pub max_results: usize,
    /// Time the call may take
    pub timeout: Duration,
    /// Token the implementation should observe to abort early
    pub cancel: CancellationToken,
}

impl WebSearchOptions {
    /// Create options with a fresh cancellation token
    #[inline]
    #[must_use]
    pub fn new(max_results: usize, timeout: Duration) -> Self {
        Self {
            max_results,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Set cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// External web search
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Run a search
    async fn search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError>;
}

#[async_trait]
impl<T: WebSearchClient + ?Sized> WebSearchClient for Arc<T> {
    async fn search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        (**self).search(query, options).await
    }
}

/// Search the web, bounded by `timeout` and by `parent` cancellation
///
/// Provider errors and timeouts yield an empty result. On timeout the
/// in-flight call's token is cancelled so it does not outlive the request.
///
/// # Errors
/// Returns [`RetrievalError::Cancelled`] only when `parent` is cancelled.
pub async fn search_bounded(
    client: &dyn WebSearchClient,
    query: &str,
    max_results: usize,
    timeout: Duration,
    parent: &CancellationToken,
) -> Result<Vec<WebResult>, RetrievalError> {
    let call_token = parent.child_token();
    let options = WebSearchOptions::new(max_results, timeout).with_cancel(call_token.clone());

    let outcome = tokio::select! {
        biased;
        () = parent.cancelled() => return Err(RetrievalError::Cancelled),
        outcome = tokio::time::timeout(timeout, client.search(query, &options)) => outcome,
    };

    match outcome {
        Ok(Ok(mut results)) => {
            results.truncate(max_results);
            Ok(results)
        }
        Ok(Err(err)) => {
            if parent.is_cancelled() {
                return Err(RetrievalError::Cancelled);
            }
            tracing::warn!(error = %err, "web search failed; continuing without web evidence");
            Ok(Vec::new())
        }
        Err(_) => {
            call_token.cancel();
            tracing::warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "web search timed out; continuing without web evidence"
            );
            Ok(Vec::new())
        }
    }
}

/// HTTP web search configuration
#[derive(Debug, Clone)]
pub struct HttpWebSearchConfig {
    /// Search endpoint; receives `q` and `count` query parameters
    pub endpoint: String,
    /// Bearer token, if the provider needs one
    pub api_key: Option<String>,
}

impl HttpWebSearchConfig {
    /// Create config for an endpoint
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    /// Set API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default, alias = "description", alias = "content")]
    snippet: String,
    #[serde(default, alias = "publishedDate", alias = "published_date", alias = "date")]
    published: Option<String>,
}

impl SearchHit {
    fn into_result(self) -> WebResult {
        let published = self.published.as_deref().and_then(parse_published_date);
        let result = WebResult::new(self.title, self.url, self.snippet);
        match published {
            Some(date) => result.with_published_date(date),
            None => result,
        }
    }
}

fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

/// Web search over a JSON HTTP API
///
/// Expects a response of the form `{"results": [{"title", "url", "snippet",
/// "publishedDate"}]}`.
#[derive(Debug, Clone)]
pub struct HttpWebSearchClient {
    config: HttpWebSearchConfig,
    client: reqwest::Client,
}

impl HttpWebSearchClient {
    /// Create client
    #[must_use]
    pub fn new(config: HttpWebSearchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        let count = options.max_results.to_string();
        let mut request = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", query), ("count", count.as_str())])
            .timeout(options.timeout);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::Timeout {
                    millis: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                RetrievalError::WebSearch(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::WebSearch(format!(
                "search provider returned status {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::WebSearch(e.to_string()))?;
        Ok(body
            .results
            .into_iter()
            .take(options.max_results)
            .map(SearchHit::into_result)
            .collect())
    }
}

#[async_trait]
impl WebSearchClient for HttpWebSearchClient {
    async fn search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        tokio::select! {
            () = options.cancel.cancelled() => Err(RetrievalError::Cancelled),
            results = self.fetch(query, options) => results,
        }
    }
}

/// TTL cache in front of a web search client
///
/// Only non-empty successful results are cached. Keys are the query with
/// case and whitespace normalized.
pub struct CachedWebSearch<C> {
    inner: C,
    cache: Cache<String, Arc<Vec<WebResult>>>,
}

impl<C: WebSearchClient> CachedWebSearch<C> {
    /// Wrap `inner` with a cache of `max_capacity` queries living `ttl`
    #[must_use]
    pub fn new(inner: C, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Number of cached queries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Drop every cached query
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

/// Normalized query plus the requested result count
fn cache_key(query: &str, max_results: usize) -> String {
    let normalized = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{max_results}:{normalized}")
}

#[async_trait]
impl<C: WebSearchClient> WebSearchClient for CachedWebSearch<C> {
    async fn search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        let key = cache_key(query, options.max_results);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(query = %key, "web search cache hit");
            return Ok(hit.as_ref().clone());
        }

        let results = self.inner.search(query, options).await?;
        if !results.is_empty() {
            self.cache.insert(key, Arc::new(results.clone())).await;
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use pretty_assertions::assert_eq;

    mock! {
        Search {}

        #[async_trait]
        impl WebSearchClient for Search {
            async fn search(
                &self,
                query: &str,
                options: &WebSearchOptions,
            ) -> Result<Vec<WebResult>, RetrievalError>;
        }
    }

    struct Stalled;

    #[async_trait]
    impl WebSearchClient for Stalled {
        async fn search(
            &self,
            _query: &str,
            options: &WebSearchOptions,
        ) -> Result<Vec<WebResult>, RetrievalError> {
            options.cancel.cancelled().await;
            Err(RetrievalError::Cancelled)
        }
    }

    fn sample(n: usize) -> Vec<WebResult> {
        (0..n)
            .map(|i| WebResult::new(format!("Result {i}"), format!("https://example.com/{i}"), "snippet"))
            .collect()
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(clamp_web_timeout(Duration::from_secs(1)), MIN_WEB_TIMEOUT);
        assert_eq!(clamp_web_timeout(Duration::from_secs(30)), MAX_WEB_TIMEOUT);
        assert_eq!(
            clamp_web_timeout(Duration::from_millis(4000)),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn parses_published_dates() {
        assert!(parse_published_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_published_date("2024-03-01").is_some());
        assert!(parse_published_date("yesterday").is_none());
    }

    #[test]
    fn search_hit_aliases() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results":[{"title":"T","url":"https://a","description":"d","publishedDate":"2024-01-02"}]}"#,
        )
        .unwrap();
        let result = body.results.into_iter().next().unwrap().into_result();
        assert_eq!(result.snippet, "d");
        assert!(result.published_date.is_some());
    }

    #[tokio::test]
    async fn bounded_search_truncates() {
        let mut mock = MockSearch::new();
        mock.expect_search().times(1).returning(|_, _| Ok(sample(8)));
        let results = search_bounded(
            &mock,
            "gold price",
            5,
            MIN_WEB_TIMEOUT,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn provider_error_is_empty() {
        let mut mock = MockSearch::new();
        mock.expect_search()
            .returning(|_, _| Err(RetrievalError::WebSearch("503".into())));
        let results = search_bounded(&mock, "q", 5, MIN_WEB_TIMEOUT, &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_empty() {
        let results = search_bounded(
            &Stalled,
            "q",
            5,
            Duration::from_millis(3500),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        parent.cancel();
        let err = search_bounded(&Stalled, "q", 5, MAX_WEB_TIMEOUT, &parent)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn cache_serves_repeat_queries() {
        let mut mock = MockSearch::new();
        mock.expect_search().times(1).returning(|_, _| Ok(sample(3)));
        let cached = CachedWebSearch::new(mock, 16, Duration::from_secs(60));
        let options = WebSearchOptions::new(5, MIN_WEB_TIMEOUT);

        let first = cached.search("Gold  Price", &options).await.unwrap();
        let second = cached.search("gold price", &options).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cache_skips_empty_results() {
        let mut mock = MockSearch::new();
        mock.expect_search().times(2).returning(|_, _| Ok(Vec::new()));
        let cached = CachedWebSearch::new(mock, 16, Duration::from_secs(60));
        let options = WebSearchOptions::new(5, MIN_WEB_TIMEOUT);
        cached.search("q", &options).await.unwrap();
        cached.search("q", &options).await.unwrap();
    }

    #[tokio::test]
    async fn larger_result_count_is_not_served_from_a_smaller_entry() {
        let mut mock = MockSearch::new();
        mock.expect_search()
            .times(2)
            .returning(|_, options| Ok(sample(options.max_results)));
        let cached = CachedWebSearch::new(mock, 16, Duration::from_secs(60));

        let few = cached
            .search("gold price", &WebSearchOptions::new(2, MIN_WEB_TIMEOUT))
            .await
            .unwrap();
        let more = cached
            .search("gold price", &WebSearchOptions::new(5, MIN_WEB_TIMEOUT))
            .await
            .unwrap();
        assert_eq!(few.len(), 2);
        assert_eq!(more.len(), 5);

        let again = cached
            .search("Gold Price", &WebSearchOptions::new(5, MIN_WEB_TIMEOUT))
            .await
            .unwrap();
        assert_eq!(again, more);
    }
}
