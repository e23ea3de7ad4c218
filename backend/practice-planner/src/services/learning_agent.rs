use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PlannerSettings;
use crate::models::{
    ContentPlan, GeneratedQuestion, LearningInsights, PerformanceAnalysis, SessionSubmission,
};
use crate::services::collaborators::{GenerationClient, PerformanceStore, SearchClient};
use crate::services::content_planner::plan_content;
use crate::services::context_builder::build_brief;
use crate::services::feedback_service::{FeedbackOutcome, FeedbackService};
use crate::services::insights_service::InsightsService;
use crate::services::performance_analyzer::analyze;
use crate::services::question_generator::{QuestionGenerator, SessionMemory};
use crate::services::resource_augmenter::ResourceAugmenter;

/// External collaborators the pipeline runs against.
#[derive(Clone)]
pub struct AgentDeps {
    pub store: Arc<dyn PerformanceStore>,
    pub generator: Arc<dyn GenerationClient>,
    /// `None` disables augmentation regardless of what callers ask for.
    pub search: Option<Arc<dyn SearchClient>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionBatch {
    pub analysis: PerformanceAnalysis,
    pub plan: ContentPlan,
    pub augmented: bool,
    /// Empty means generation was unavailable, not that nothing is relevant.
    pub questions: Vec<GeneratedQuestion>,
}

/// Adaptive planner for one learner: analysis, content mix, optional
/// augmentation, generation, and the feedback loop that closes the cycle.
pub struct LearningAgent {
    user_id: String,
    settings: PlannerSettings,
    store: Arc<dyn PerformanceStore>,
    augmenter: Option<ResourceAugmenter>,
    questions: QuestionGenerator,
    insights: InsightsService,
    feedback: FeedbackService,
}

impl LearningAgent {
    pub fn new(user_id: impl Into<String>, deps: AgentDeps, settings: PlannerSettings) -> Self {
        let user_id = user_id.into();
        info!(user_id = %user_id, "Learning agent initialized");

        Self {
            augmenter: deps
                .search
                .map(|search| ResourceAugmenter::new(search, &settings)),
            questions: QuestionGenerator::new(deps.generator.clone(), &settings),
            insights: InsightsService::new(deps.generator, &settings),
            feedback: FeedbackService::new(deps.store.clone()),
            store: deps.store,
            settings,
            user_id,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_memory(&self) -> &SessionMemory {
        self.questions.memory()
    }

    pub async fn analyze_performance(&self) -> Result<PerformanceAnalysis> {
        let stats = self
            .store
            .topic_stats(&self.user_id)
            .await
            .context("Failed to load topic stats")?;
        let recent = self
            .store
            .recent_attempts(&self.user_id, self.settings.recent_window)
            .await
            .context("Failed to load recent attempts")?;

        Ok(analyze(&stats, &recent, self.settings.recent_window))
    }

    /// Runs one planning cycle. Only persistence failures are errors; search
    /// and generation problems degrade to no augmentation or no questions.
    pub async fn generate_questions(
        &mut self,
        count: u32,
        use_web_search: bool,
    ) -> Result<QuestionBatch> {
        let analysis = self.analyze_performance().await?;
        let plan = plan_content(count);

        let augmentation = match (&self.augmenter, use_web_search) {
            (Some(augmenter), true) => augmenter.augment(&analysis).await,
            (None, true) => {
                warn!(user_id = %self.user_id, "Web search requested but no search client configured");
                String::new()
            }
            (_, false) => String::new(),
        };
        if !augmentation.is_empty() {
            info!(chars = augmentation.len(), "Adding reference material to the brief");
        }

        let brief = build_brief(&self.settings.subject, &analysis, &augmentation);
        let questions = self.questions.generate(&brief, &analysis, &plan).await;

        info!(
            user_id = %self.user_id,
            requested = count,
            generated = questions.len(),
            difficulty = %analysis.recommended_difficulty,
            "Planning cycle finished"
        );

        Ok(QuestionBatch {
            analysis,
            plan,
            augmented: !augmentation.is_empty(),
            questions,
        })
    }

    pub async fn learning_insights(&self) -> Result<LearningInsights> {
        let analysis = self.analyze_performance().await?;
        let brief = build_brief(&self.settings.subject, &analysis, "");
        Ok(self.insights.insights(&brief, &analysis).await)
    }

    pub async fn update_performance(
        &self,
        submission: &SessionSubmission,
    ) -> Result<FeedbackOutcome> {
        self.feedback
            .submit_session(&self.user_id, submission)
            .await
    }
}
