use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AggregateUpdateError;
use crate::metrics::{AGGREGATE_UPDATE_CONFLICTS_TOTAL, FEEDBACK_ATTEMPTS_RECORDED_TOTAL};
use crate::models::{
    Attempt, AttemptRecord, GameSessionSummary, SessionSubmission, TopicDelta, TopicStat,
    UserAggregate,
};
use crate::services::collaborators::PerformanceStore;
use crate::services::performance_analyzer::{classify_accuracy, TopicStanding};
use crate::utils::retry::{retry_async_when, RetryConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    pub session_id: String,
    pub attempts_recorded: usize,
    /// Counters after the batch, for every topic the batch touched.
    pub topic_stats: BTreeMap<String, TopicStat>,
    pub aggregate: UserAggregate,
}

/// Folds completed sessions back into the stored performance model.
pub struct FeedbackService {
    store: Arc<dyn PerformanceStore>,
    aggregate_retry: RetryConfig,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn PerformanceStore>) -> Self {
        Self {
            store,
            aggregate_retry: RetryConfig::default(),
        }
    }

    pub fn with_aggregate_retry(mut self, retry: RetryConfig) -> Self {
        self.aggregate_retry = retry;
        self
    }

    pub async fn submit_session(
        &self,
        user_id: &str,
        submission: &SessionSubmission,
    ) -> Result<FeedbackOutcome> {
        info!(
            user_id,
            game_type = %submission.summary.game_type,
            attempts = submission.attempts.len(),
            "Processing session submission"
        );

        let session_id = self
            .store
            .insert_game_session(user_id, &submission.summary)
            .await
            .context("Failed to save game session")?;

        let topic_stats = self
            .record_attempts(user_id, Some(&session_id), &submission.attempts)
            .await?;

        let aggregate = self
            .update_user_aggregate(user_id, &submission.summary, &topic_stats)
            .await?;

        info!(
            user_id,
            session_id = %session_id,
            topics = topic_stats.len(),
            total_games = aggregate.total_games_played,
            "Session folded into performance model"
        );

        Ok(FeedbackOutcome {
            session_id,
            attempts_recorded: submission.attempts.len(),
            topic_stats,
            aggregate,
        })
    }

    /// Persists attempts one at a time. A failure stops the batch but leaves
    /// every earlier attempt and its topic increment committed.
    pub async fn record_attempts(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        attempts: &[Attempt],
    ) -> Result<BTreeMap<String, TopicStat>> {
        let mut touched = BTreeMap::new();

        for (index, attempt) in attempts.iter().enumerate() {
            let record = AttemptRecord::new(user_id, session_id, attempt);
            self.store
                .insert_attempt(&record)
                .await
                .with_context(|| {
                    format!("Failed to record attempt {} of {}", index + 1, attempts.len())
                })?;

            let stat = self
                .store
                .upsert_topic_stat(user_id, &attempt.topic, TopicDelta::from(attempt))
                .await
                .with_context(|| format!("Failed to update topic stats for {}", attempt.topic))?;

            FEEDBACK_ATTEMPTS_RECORDED_TOTAL
                .with_label_values(&[if attempt.is_correct { "true" } else { "false" }])
                .inc();
            debug!(
                user_id,
                topic = %stat.topic,
                total = stat.total_attempts,
                correct = stat.correct_attempts,
                accuracy = stat.accuracy(),
                "Topic stats updated"
            );

            touched.insert(stat.topic.clone(), stat);
        }

        Ok(touched)
    }

    async fn update_user_aggregate(
        &self,
        user_id: &str,
        summary: &GameSessionSummary,
        touched: &BTreeMap<String, TopicStat>,
    ) -> Result<UserAggregate> {
        let mut weak = Vec::new();
        let mut strong = Vec::new();
        for stat in touched.values() {
            match classify_accuracy(stat.accuracy()) {
                TopicStanding::Weak => weak.push(stat.topic.clone()),
                TopicStanding::Strong => strong.push(stat.topic.clone()),
                TopicStanding::Neutral => {}
            }
        }

        retry_async_when(
            self.aggregate_retry.clone(),
            AggregateUpdateError::is_conflict,
            || self.try_update_aggregate(user_id, summary, &weak, &strong),
        )
        .await
        .map_err(|err| match err {
            AggregateUpdateError::Store(inner) => inner.context("Failed to update user stats"),
            conflict => anyhow::Error::new(conflict),
        })
    }

    async fn try_update_aggregate(
        &self,
        user_id: &str,
        summary: &GameSessionSummary,
        weak: &[String],
        strong: &[String],
    ) -> Result<UserAggregate, AggregateUpdateError> {
        let current = self.store.user_aggregate(user_id).await?;
        let expected_version = current.as_ref().map(|aggregate| aggregate.version);
        let next = current
            .unwrap_or_else(|| UserAggregate::new(user_id))
            .fold_session(summary, weak, strong);

        if self
            .store
            .upsert_user_aggregate(&next, expected_version)
            .await?
        {
            Ok(next)
        } else {
            AGGREGATE_UPDATE_CONFLICTS_TOTAL.inc();
            warn!(user_id, "User aggregate changed concurrently, retrying");
            Err(AggregateUpdateError::Conflict(user_id.to_string()))
        }
    }
}
