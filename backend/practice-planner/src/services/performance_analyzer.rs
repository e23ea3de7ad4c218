use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Attempt, Difficulty, PerformanceAnalysis, TopicStat, TopicSummary};

pub const WEAK_THRESHOLD: f64 = 60.0;
pub const STRONG_THRESHOLD: f64 = 80.0;
pub const EASY_BELOW: f64 = 50.0;
pub const HARD_ABOVE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStanding {
    Weak,
    Neutral,
    Strong,
}

/// Both thresholds are exclusive: exactly 60 or 80 is neutral.
pub fn classify_accuracy(accuracy: f64) -> TopicStanding {
    if accuracy < WEAK_THRESHOLD {
        TopicStanding::Weak
    } else if accuracy > STRONG_THRESHOLD {
        TopicStanding::Strong
    } else {
        TopicStanding::Neutral
    }
}

pub fn recommend_difficulty(recent_accuracy: f64) -> Difficulty {
    if recent_accuracy < EASY_BELOW {
        Difficulty::Easy
    } else if recent_accuracy > HARD_ABOVE {
        Difficulty::Hard
    } else {
        Difficulty::Medium
    }
}

/// Percentage correct over the first `window` attempts of a most-recent-first
/// slice. Only the window is touched, whatever the length of `recent`.
pub fn recent_accuracy(recent: &[Attempt], window: usize) -> f64 {
    let sample = &recent[..recent.len().min(window)];
    if sample.is_empty() {
        return 0.0;
    }
    let correct = sample.iter().filter(|a| a.is_correct).count();
    correct as f64 / sample.len() as f64 * 100.0
}

/// Builds the planning snapshot from stored aggregates and a recent sample.
///
/// Pure and deterministic: the same inputs always give the same analysis.
pub fn analyze(stats: &[TopicStat], recent: &[Attempt], window: usize) -> PerformanceAnalysis {
    let recent_accuracy = recent_accuracy(recent, window);

    let mut topic_breakdown = BTreeMap::new();
    let mut weak: Vec<(&str, f64)> = Vec::new();
    let mut strong: Vec<(&str, f64)> = Vec::new();
    let mut total_attempts = 0u64;

    for stat in stats.iter().filter(|s| s.total_attempts > 0) {
        total_attempts += stat.total_attempts as u64;
        let accuracy = stat.accuracy();
        topic_breakdown.insert(stat.topic.clone(), TopicSummary::from(stat));

        match classify_accuracy(accuracy) {
            TopicStanding::Weak => weak.push((stat.topic.as_str(), accuracy)),
            TopicStanding::Strong => strong.push((stat.topic.as_str(), accuracy)),
            TopicStanding::Neutral => {}
        }
    }

    weak.sort_by(|a, b| cmp_accuracy(a.1, b.1).then_with(|| a.0.cmp(b.0)));
    strong.sort_by(|a, b| cmp_accuracy(b.1, a.1).then_with(|| a.0.cmp(b.0)));

    PerformanceAnalysis {
        total_attempts,
        recent_accuracy,
        topic_breakdown,
        weak_topics: weak.into_iter().map(|(t, _)| t.to_string()).collect(),
        strong_topics: strong.into_iter().map(|(t, _)| t.to_string()).collect(),
        recommended_difficulty: recommend_difficulty(recent_accuracy),
    }
}

fn cmp_accuracy(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
