use serde::{Deserialize, Serialize};
use std::fmt;

pub mod attempt;
pub mod performance;
pub mod question;
pub mod session;

pub use attempt::{Attempt, AttemptRecord, TopicDelta, TopicStat};
pub use performance::{ContentPlan, PerformanceAnalysis, TopicSummary};
pub use question::{GeneratedQuestion, LearningInsights};
pub use session::{GameSessionSummary, SessionSubmission, UserAggregate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "Easy", alias = "EASY")]
    Easy,
    #[default]
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Hard", alias = "HARD")]
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
