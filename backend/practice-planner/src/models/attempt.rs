use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Difficulty;

/// One answered question as submitted at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(default)]
    pub question_id: Option<u32>,
    #[serde(default = "unknown_topic")]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub is_correct: bool,
    /// Milliseconds. Game clients send it as `time_spent`.
    #[serde(default, alias = "time_spent", alias = "timeSpent")]
    pub time_spent_ms: u64,
}

fn unknown_topic() -> String {
    "Unknown".to_string()
}

/// Persisted form of an [`Attempt`]. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub question_id: Option<u32>,
    pub topic: String,
    pub difficulty: Difficulty,
    pub is_correct: bool,
    pub time_spent_ms: u64,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(user_id: &str, session_id: Option<&str>, attempt: &Attempt) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.map(str::to_string),
            question_id: attempt.question_id,
            topic: attempt.topic.clone(),
            difficulty: attempt.difficulty,
            is_correct: attempt.is_correct,
            time_spent_ms: attempt.time_spent_ms,
            recorded_at: Utc::now(),
        }
    }

    pub fn as_attempt(&self) -> Attempt {
        Attempt {
            question_id: self.question_id,
            topic: self.topic.clone(),
            difficulty: self.difficulty,
            is_correct: self.is_correct,
            time_spent_ms: self.time_spent_ms,
        }
    }
}

/// Running aggregate for one (user, topic) pair.
///
/// Only the counters are stored; accuracy and average time are always derived
/// from them so they cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStat {
    pub topic: String,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    #[serde(default)]
    pub total_time_ms: u64,
}

impl TopicStat {
    pub fn empty(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            total_attempts: 0,
            correct_attempts: 0,
            total_time_ms: 0,
        }
    }

    /// Percentage of correct attempts, 0 when nothing has been attempted.
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.correct_attempts as f64 / self.total_attempts as f64 * 100.0
    }

    /// Mean time per attempt in seconds.
    pub fn avg_time_secs(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.total_time_ms as f64 / 1000.0 / self.total_attempts as f64
    }

    pub fn apply(&mut self, delta: &TopicDelta) {
        self.total_attempts += delta.attempts;
        self.correct_attempts += delta.correct;
        self.total_time_ms += delta.time_ms;
    }
}

/// Increment applied to a [`TopicStat`] for one recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicDelta {
    pub attempts: u32,
    pub correct: u32,
    pub time_ms: u64,
}

impl From<&Attempt> for TopicDelta {
    fn from(attempt: &Attempt) -> Self {
        Self {
            attempts: 1,
            correct: u32::from(attempt.is_correct),
            time_ms: attempt.time_spent_ms,
        }
    }
}
