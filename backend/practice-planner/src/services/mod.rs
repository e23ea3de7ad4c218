use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use crate::config::Config;
use collaborators::SearchClient;
use learning_agent::{AgentDeps, LearningAgent};
use llm_client::ChatCompletionsClient;
use mongo_store::MongoPerformanceStore;
use search_cache::CachedSearchClient;
use web_search::WebSearchClient;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    /// Absent when no Redis is configured or it could not be reached.
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: Option<redis::Client>,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        MongoPerformanceStore::new(mongo.clone())
            .ensure_indexes()
            .await?;

        let redis = match redis_client {
            Some(client) => match connect_redis(client).await {
                Ok(manager) => Some(manager),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, continuing without search cache");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }

    /// Production collaborators: MongoDB store, chat-completions generator and
    /// web search, cached through Redis when it is available.
    pub fn agent_deps(&self) -> anyhow::Result<AgentDeps> {
        let generator = ChatCompletionsClient::new(&self.config.generation)
            .context("Failed to build generation client")?;
        let web_search =
            WebSearchClient::new(&self.config.search).context("Failed to build search client")?;

        let search: Arc<dyn SearchClient> = match &self.redis {
            Some(redis) => Arc::new(CachedSearchClient::new(Arc::new(web_search), redis.clone())),
            None => Arc::new(web_search),
        };

        Ok(AgentDeps {
            store: Arc::new(MongoPerformanceStore::new(self.mongo.clone())),
            generator: Arc::new(generator),
            search: Some(search),
        })
    }

    pub fn agent_for(&self, user_id: &str) -> anyhow::Result<LearningAgent> {
        Ok(LearningAgent::new(
            user_id,
            self.agent_deps()?,
            self.config.planner.clone(),
        ))
    }
}

async fn connect_redis(client: redis::Client) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod collaborators;
pub mod content_planner;
pub mod context_builder;
pub mod feedback_service;
pub mod insights_service;
pub mod learning_agent;
pub mod llm_client;
pub mod mongo_store;
pub mod performance_analyzer;
pub mod question_generator;
pub mod resource_augmenter;
pub mod response_extractor;
pub mod search_cache;
pub mod web_search;
