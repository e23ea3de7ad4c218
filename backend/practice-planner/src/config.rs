use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: Option<String>,
    pub generation: GenerationConfig,
    pub search: SearchConfig,
    pub planner: PlannerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    pub request_timeout_secs: u64,
}

/// Tunables for the planning cycle. Defaults mirror production behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSettings {
    pub subject: String,
    pub recent_window: usize,
    pub default_topics: Vec<String>,
    pub max_augmented_topics: usize,
    pub weak_topic_results: usize,
    pub default_topic_results: usize,
    pub snippet_chars: usize,
    pub search_max_attempts: usize,
    pub search_base_backoff: Duration,
    pub inter_topic_delay: Duration,
    pub session_memory_capacity: usize,
    pub question_temperature: f32,
    pub question_max_tokens: u32,
    pub insights_temperature: f32,
    pub insights_max_tokens: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            subject: "SAT".to_string(),
            recent_window: 50,
            default_topics: vec!["Algebra".to_string(), "Grammar".to_string()],
            max_augmented_topics: 2,
            weak_topic_results: 3,
            default_topic_results: 2,
            snippet_chars: 150,
            search_max_attempts: 3,
            search_base_backoff: Duration::from_secs(4),
            inter_topic_delay: Duration::from_secs(3),
            session_memory_capacity: 32,
            question_temperature: 0.7,
            question_max_tokens: 8000,
            insights_temperature: 0.8,
            insights_max_tokens: 500,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, env_key: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(env_key).ok())
                .filter(|value| !value.trim().is_empty())
        };

        let api_key = lookup("generation.api_key", "OPENROUTER_API_KEY")
            .ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let mongo_uri = lookup("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database = lookup("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "practice_planner".to_string());

        let redis_uri = lookup("redis.uri", "REDIS_URI");
        if redis_uri.is_none() {
            tracing::info!("REDIS_URI not set, search results will not be cached");
        }

        let generation = GenerationConfig {
            api_key,
            base_url: lookup("generation.base_url", "OPENROUTER_BASE_URL")
                .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
            model: lookup("generation.model", "GENERATION_MODEL")
                .unwrap_or_else(|| "anthropic/claude-haiku-4.5".to_string()),
            request_timeout_secs: settings
                .get_int("generation.request_timeout_secs")
                .map(|secs| secs.max(1) as u64)
                .unwrap_or(120),
        };

        let search = SearchConfig {
            url: lookup("search.url", "SEARCH_API_URL")
                .unwrap_or_else(|| "http://localhost:8888".to_string()),
            request_timeout_secs: settings
                .get_int("search.request_timeout_secs")
                .map(|secs| secs.max(1) as u64)
                .unwrap_or(20),
        };

        let mut planner = PlannerSettings::default();
        if let Some(subject) = lookup("planner.subject", "PLANNER_SUBJECT") {
            planner.subject = subject;
        }
        if let Ok(window) = settings.get_int("planner.recent_window") {
            planner.recent_window = window.max(1) as usize;
        }
        if let Ok(capacity) = settings.get_int("planner.session_memory_capacity") {
            planner.session_memory_capacity = capacity.max(1) as usize;
        }

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            generation,
            search,
            planner,
        })
    }
}
