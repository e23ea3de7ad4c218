use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReplaceOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::metrics::track_db_operation;
use crate::models::{
    Attempt, AttemptRecord, GameSessionSummary, TopicDelta, TopicStat, UserAggregate,
};
use crate::services::collaborators::PerformanceStore;
use crate::utils::time::chrono_to_bson;

const ATTEMPTS: &str = "question_attempts";
const TOPIC_STATS: &str = "topic_stats";
const USER_STATS: &str = "user_stats";
const GAME_SESSIONS: &str = "game_sessions";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
struct GameSessionRecord {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    #[serde(flatten)]
    summary: GameSessionSummary,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
}

/// Compound key, so no choice of separator can make two pairs collide.
fn topic_stat_id(user_id: &str, topic: &str) -> Document {
    doc! { "user_id": user_id, "topic": topic }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == DUPLICATE_KEY
    )
}

/// MongoDB-backed [`PerformanceStore`].
#[derive(Clone)]
pub struct MongoPerformanceStore {
    mongo: Database,
}

impl MongoPerformanceStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn attempts(&self) -> Collection<AttemptRecord> {
        self.mongo.collection(ATTEMPTS)
    }

    fn topic_stats_collection(&self) -> Collection<TopicStat> {
        self.mongo.collection(TOPIC_STATS)
    }

    fn user_stats(&self) -> Collection<UserAggregate> {
        self.mongo.collection(USER_STATS)
    }

    /// Creates the lookup indexes the planner queries rely on. Safe to call on
    /// every start.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "recorded_at": -1 })
                    .build(),
            )
            .await
            .context("Failed to create attempts index")?;

        self.topic_stats_collection()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "topic": 1 })
                    .build(),
            )
            .await
            .context("Failed to create topic stats index")?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl PerformanceStore for MongoPerformanceStore {
    async fn topic_stats(&self, user_id: &str) -> Result<Vec<TopicStat>> {
        track_db_operation("find", TOPIC_STATS, async {
            let cursor = self
                .topic_stats_collection()
                .find(doc! { "user_id": user_id })
                .with_options(FindOptions::builder().sort(doc! { "topic": 1 }).build())
                .await
                .context("Failed to query topic stats")?;

            cursor
                .try_collect()
                .await
                .context("Failed to collect topic stats")
        })
        .await
    }

    async fn recent_attempts(&self, user_id: &str, limit: usize) -> Result<Vec<Attempt>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        track_db_operation("find", ATTEMPTS, async {
            let find_options = FindOptions::builder()
                .sort(doc! { "recorded_at": -1 })
                .limit(limit as i64)
                .build();

            let cursor = self
                .attempts()
                .find(doc! { "user_id": user_id })
                .with_options(find_options)
                .await
                .context("Failed to query recent attempts")?;

            let records: Vec<AttemptRecord> = cursor
                .try_collect()
                .await
                .context("Failed to collect recent attempts")?;

            Ok::<_, anyhow::Error>(records.iter().map(AttemptRecord::as_attempt).collect())
        })
        .await
    }

    async fn upsert_topic_stat(
        &self,
        user_id: &str,
        topic: &str,
        delta: TopicDelta,
    ) -> Result<TopicStat> {
        let stat_id = topic_stat_id(user_id, topic);

        track_db_operation("find_one_and_update", TOPIC_STATS, async {
            let updated = self
                .topic_stats_collection()
                .find_one_and_update(
                    doc! { "_id": stat_id },
                    doc! {
                        "$inc": {
                            "total_attempts": delta.attempts as i64,
                            "correct_attempts": delta.correct as i64,
                            "total_time_ms": delta.time_ms as i64,
                        },
                        "$set": { "updated_at": chrono_to_bson(Utc::now()) },
                        "$setOnInsert": { "user_id": user_id, "topic": topic },
                    },
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .upsert(true)
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .await
                .context("Failed to increment topic stats")?;

            updated.ok_or_else(|| {
                anyhow::anyhow!("Topic stat {}/{} missing after upsert", user_id, topic)
            })
        })
        .await
    }

    async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        track_db_operation("insert_one", ATTEMPTS, async {
            self.attempts()
                .insert_one(attempt)
                .await
                .context("Failed to insert attempt")?;
            Ok::<_, anyhow::Error>(())
        })
        .await
    }

    async fn insert_game_session(
        &self,
        user_id: &str,
        summary: &GameSessionSummary,
    ) -> Result<String> {
        let record = GameSessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            summary: summary.clone(),
            created_at: Utc::now(),
        };

        track_db_operation("insert_one", GAME_SESSIONS, async {
            self.mongo
                .collection::<GameSessionRecord>(GAME_SESSIONS)
                .insert_one(&record)
                .await
                .context("Failed to insert game session")?;
            Ok::<_, anyhow::Error>(record.id.clone())
        })
        .await
    }

    async fn user_aggregate(&self, user_id: &str) -> Result<Option<UserAggregate>> {
        track_db_operation("find_one", USER_STATS, async {
            self.user_stats()
                .find_one(doc! { "_id": user_id })
                .await
                .context("Failed to load user stats")
        })
        .await
    }

    async fn upsert_user_aggregate(
        &self,
        aggregate: &UserAggregate,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        track_db_operation("replace_one", USER_STATS, async {
            let Some(expected) = expected_version else {
                return match self.user_stats().insert_one(aggregate).await {
                    Ok(_) => Ok(true),
                    Err(e) if is_duplicate_key(&e) => Ok(false),
                    Err(e) => Err(anyhow::Error::new(e).context("Failed to create user stats")),
                };
            };

            let result = self
                .user_stats()
                .replace_one(
                    doc! { "_id": &aggregate.user_id, "version": expected as i64 },
                    aggregate,
                )
                .with_options(ReplaceOptions::builder().upsert(false).build())
                .await
                .context("Failed to update user stats")?;

            Ok(result.matched_count == 1)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_stat_ids_are_scoped_per_user() {
        assert_eq!(
            topic_stat_id("u1", "Algebra"),
            doc! { "user_id": "u1", "topic": "Algebra" }
        );
        assert_ne!(topic_stat_id("u1", "Algebra"), topic_stat_id("u2", "Algebra"));
    }

    #[test]
    fn separators_in_names_do_not_collide() {
        assert_ne!(topic_stat_id("a:b", "c"), topic_stat_id("a", "b:c"));
        assert_ne!(topic_stat_id("a/b", "c"), topic_stat_id("a", "b/c"));
    }
}
