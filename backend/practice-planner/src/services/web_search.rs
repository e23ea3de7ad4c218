use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::services::collaborators::{SearchClient, SearchHit};

/// Client for a metasearch endpoint that answers `GET /search?q=..&format=json`
/// with `{"results": [{"title", "content"}]}` (SearXNG-compatible).
pub struct WebSearchClient {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Engines disagree on the body field name and some send more than one.
#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl SearchResult {
    /// First non-blank of `content`, `body` and `snippet`. `None` when the
    /// title is blank as well.
    fn into_hit(self) -> Option<SearchHit> {
        let body = [self.content, self.body, self.snippet]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default();

        if self.title.trim().is_empty() && body.is_empty() {
            return None;
        }
        Some(SearchHit {
            title: self.title,
            body,
        })
    }
}

impl WebSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

/// 429 is the standard signal; some engines answer 202 with an empty page
/// when they throttle.
fn is_rate_limit_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::ACCEPTED
}

#[async_trait]
impl SearchClient for WebSearchClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if is_rate_limit_status(status) {
            return Err(SearchError::RateLimited(format!("status {}", status)));
        }
        if !status.is_success() {
            return Err(SearchError::Transport(format!("status {}", status)));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .filter_map(SearchResult::into_hit)
            .take(max_results)
            .collect())
    }
}
