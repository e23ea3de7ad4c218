use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Attempt;

/// Summary the game client reports when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSessionSummary {
    pub game_type: String,
    pub score: i64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    #[serde(default)]
    pub max_streak: u32,
    #[serde(default)]
    pub avg_response_time: f64,
}

impl GameSessionSummary {
    pub fn answered(&self) -> u32 {
        self.correct_answers + self.wrong_answers
    }

    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_answers as u64, self.answered() as u64)
    }
}

/// Everything submitted at the end of one game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSubmission {
    pub summary: GameSessionSummary,
    pub attempts: Vec<Attempt>,
}

/// Lifetime statistics for one user, updated once per submitted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAggregate {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub total_games_played: u32,
    pub total_score: i64,
    pub total_questions_answered: u64,
    pub total_correct: u64,
    pub total_wrong: u64,
    pub overall_accuracy: f64,
    #[serde(default)]
    pub weak_topics: BTreeSet<String>,
    #[serde(default)]
    pub strong_topics: BTreeSet<String>,
    /// Optimistic-concurrency token, bumped on every write.
    #[serde(default)]
    pub version: u64,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl UserAggregate {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_games_played: 0,
            total_score: 0,
            total_questions_answered: 0,
            total_correct: 0,
            total_wrong: 0,
            overall_accuracy: 0.0,
            weak_topics: BTreeSet::new(),
            strong_topics: BTreeSet::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns the aggregate after folding in one session. Topic labels are
    /// merged by union so earned labels never disappear between sessions.
    pub fn fold_session<'a>(
        &self,
        summary: &GameSessionSummary,
        weak: impl IntoIterator<Item = &'a String>,
        strong: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut next = self.clone();
        next.total_games_played += 1;
        next.total_score += summary.score;
        next.total_correct += summary.correct_answers as u64;
        next.total_wrong += summary.wrong_answers as u64;
        next.total_questions_answered = next.total_correct + next.total_wrong;
        next.overall_accuracy = percentage(next.total_correct, next.total_questions_answered);
        next.weak_topics.extend(weak.into_iter().cloned());
        next.strong_topics.extend(strong.into_iter().cloned());
        next.version = self.version + 1;
        next.updated_at = Utc::now();
        next
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(correct: u32, wrong: u32, score: i64) -> GameSessionSummary {
        GameSessionSummary {
            game_type: "snake".into(),
            score,
            correct_answers: correct,
            wrong_answers: wrong,
            max_streak: 2,
            avg_response_time: 4.2,
        }
    }

    #[test]
    fn fold_accumulates_counters() {
        let base = UserAggregate::new("u1");
        let once = base.fold_session(&summary(3, 1, 30), &[], &[]);
        let twice = once.fold_session(&summary(1, 3, 10), &[], &[]);

        assert_eq!(twice.total_games_played, 2);
        assert_eq!(twice.total_score, 40);
        assert_eq!(twice.total_questions_answered, 8);
        assert_eq!(twice.overall_accuracy, 50.0);
        assert_eq!(twice.version, 2);
    }

    #[test]
    fn fold_merges_topic_labels_by_union() {
        let grammar = "Grammar".to_string();
        let algebra = "Algebra".to_string();
        let base = UserAggregate::new("u1").fold_session(&summary(1, 1, 5), [&grammar], [&algebra]);
        let next = base.fold_session(&summary(1, 1, 5), [], []);

        assert!(next.weak_topics.contains("Grammar"));
        assert!(next.strong_topics.contains("Algebra"));
    }
}
