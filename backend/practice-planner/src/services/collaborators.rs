//! Seams between the planning pipeline and the outside world.
//!
//! Production implementations live next to this module (`mongo_store`,
//! `llm_client`, `web_search`); tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, SearchError};
use crate::models::{
    Attempt, AttemptRecord, GameSessionSummary, TopicDelta, TopicStat, UserAggregate,
};

/// Durable home of attempts and aggregates.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    async fn topic_stats(&self, user_id: &str) -> Result<Vec<TopicStat>>;

    /// Most recent attempts first, at most `limit` of them.
    async fn recent_attempts(&self, user_id: &str, limit: usize) -> Result<Vec<Attempt>>;

    /// Atomically applies `delta`, creating the row on first use, and returns
    /// the updated counters.
    async fn upsert_topic_stat(
        &self,
        user_id: &str,
        topic: &str,
        delta: TopicDelta,
    ) -> Result<TopicStat>;

    async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()>;

    async fn insert_game_session(
        &self,
        user_id: &str,
        summary: &GameSessionSummary,
    ) -> Result<String>;

    async fn user_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>>;

    /// Writes `aggregate` only if the stored version still equals
    /// `expected_version` (`None` means no row may exist yet). Returns `false`
    /// when another writer got there first.
    async fn upsert_user_aggregate(
        &self,
        aggregate: &UserAggregate,
        expected_version: Option<u64>,
    ) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text generator used for questions and insights.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
}

/// Full-text web search used for augmentation.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}
