use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Difficulty, TopicStat};

/// Per-topic view rendered into the brief and exposed in the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub accuracy: f64,
    pub attempts: u32,
    pub avg_time: f64,
}

impl From<&TopicStat> for TopicSummary {
    fn from(stat: &TopicStat) -> Self {
        Self {
            accuracy: stat.accuracy(),
            attempts: stat.total_attempts,
            avg_time: stat.avg_time_secs(),
        }
    }
}

/// Snapshot of a learner's standing, recomputed every planning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub total_attempts: u64,
    pub recent_accuracy: f64,
    pub topic_breakdown: BTreeMap<String, TopicSummary>,
    /// Weakest first.
    pub weak_topics: Vec<String>,
    /// Strongest first.
    pub strong_topics: Vec<String>,
    pub recommended_difficulty: Difficulty,
}

/// How a generation request splits its questions across tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPlan {
    pub weak_count: u32,
    pub mixed_count: u32,
    pub strong_count: u32,
}

impl ContentPlan {
    pub fn total(&self) -> u32 {
        self.weak_count + self.mixed_count + self.strong_count
    }
}
