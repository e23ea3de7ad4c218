use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::config::PlannerSettings;
use crate::models::{LearningInsights, PerformanceAnalysis};
use crate::services::collaborators::{GenerationClient, GenerationRequest};
use crate::services::context_builder::{insights_prompt, insights_system_prompt};
use crate::services::response_extractor::extract_object;

/// Coaching summary for a learner. Falls back to canned advice whenever the
/// generator is unavailable or answers with something unusable.
pub struct InsightsService {
    client: Arc<dyn GenerationClient>,
    subject: String,
    temperature: f32,
    max_tokens: u32,
}

impl InsightsService {
    pub fn new(client: Arc<dyn GenerationClient>, settings: &PlannerSettings) -> Self {
        Self {
            client,
            subject: settings.subject.clone(),
            temperature: settings.insights_temperature,
            max_tokens: settings.insights_max_tokens,
        }
    }

    pub async fn insights(&self, brief: &str, analysis: &PerformanceAnalysis) -> LearningInsights {
        let request = GenerationRequest {
            system_prompt: insights_system_prompt(&self.subject),
            user_prompt: insights_prompt(brief),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let content = match self.client.generate(&request).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Insights request failed, using fallback");
                return LearningInsights::fallback(&analysis.weak_topics);
            }
        };

        let parsed = extract_object(&content)
            .map_err(|err| err.to_string())
            .and_then(|map| {
                serde_json::from_value::<LearningInsights>(Value::Object(map))
                    .map_err(|err| err.to_string())
            });

        match parsed {
            Ok(insights) => insights,
            Err(reason) => {
                warn!(%reason, "Could not parse insights, using fallback");
                LearningInsights::fallback(&analysis.weak_topics)
            }
        }
    }
}
