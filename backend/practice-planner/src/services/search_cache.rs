use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::SearchError;
use crate::metrics::{record_cache_hit, record_cache_miss, record_cache_operation};
use crate::services::collaborators::{SearchClient, SearchHit};

pub const SEARCH_CACHE_TTL_SECS: u64 = 3600;

fn cache_key(query: &str, max_results: usize) -> String {
    format!("search:cache:{}:{}", max_results, query)
}

/// Read-through Redis cache in front of another [`SearchClient`].
///
/// Redis problems never fail a search; they only cost a cache miss. Empty
/// result sets and errors are not cached.
pub struct CachedSearchClient {
    inner: Arc<dyn SearchClient>,
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl CachedSearchClient {
    pub fn new(inner: Arc<dyn SearchClient>, redis: ConnectionManager) -> Self {
        Self {
            inner,
            redis,
            ttl_secs: SEARCH_CACHE_TTL_SECS,
        }
    }

    async fn lookup(&self, key: &str) -> Option<Vec<SearchHit>> {
        let mut conn = self.redis.clone();
        let cached: Option<String> = match redis::cmd("GET").arg(key).query_async(&mut conn).await
        {
            Ok(value) => {
                record_cache_operation("get", true);
                value
            }
            Err(e) => {
                record_cache_operation("get", false);
                tracing::warn!(error = %e, key, "Search cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&cached?) {
            Ok(hits) => Some(hits),
            Err(e) => {
                tracing::warn!(error = %e, key, "Discarding undecodable search cache entry");
                None
            }
        }
    }

    async fn store(&self, key: &str, hits: &[SearchHit]) {
        let json = match serde_json::to_string(hits) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize search hits for cache");
                return;
            }
        };

        let mut conn = self.redis.clone();
        let result = redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(&json)
            .query_async::<()>(&mut conn)
            .await;

        record_cache_operation("setex", result.is_ok());
        if let Err(e) = result {
            tracing::warn!(error = %e, key, "Search cache write failed");
        }
    }
}

#[async_trait]
impl SearchClient for CachedSearchClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let key = cache_key(query, max_results);

        if let Some(hits) = self.lookup(&key).await {
            record_cache_hit();
            tracing::debug!(query, hits = hits.len(), "Search cache hit");
            return Ok(hits);
        }
        record_cache_miss();

        let hits = self.inner.search(query, max_results).await?;
        if !hits.is_empty() {
            self.store(&key, &hits).await;
        }
        Ok(hits)
    }
}
