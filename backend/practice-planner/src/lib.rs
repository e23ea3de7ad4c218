pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, PlannerSettings};
pub use services::learning_agent::{AgentDeps, LearningAgent, QuestionBatch};
pub use services::AppState;
