use crate::models::{ContentPlan, PerformanceAnalysis};

const WEAK_SHARE_TENTHS: u64 = 6;
const MIXED_SHARE_TENTHS: u64 = 3;

/// Label used in the request when the learner has no weak topics yet.
pub const ANY_TOPIC_LABEL: &str = "various topics";

/// Splits `total` into 60% weak, 30% mixed, and the remainder strong.
///
/// Floors are taken on the first two buckets so rounding always lands in the
/// strong bucket and the three counts sum to `total` exactly.
pub fn plan_content(total: u32) -> ContentPlan {
    let weak_count = (total as u64 * WEAK_SHARE_TENTHS / 10) as u32;
    let mixed_count = (total as u64 * MIXED_SHARE_TENTHS / 10) as u32;
    ContentPlan {
        weak_count,
        mixed_count,
        strong_count: total - weak_count - mixed_count,
    }
}

/// Topics the weak bucket is planned against.
pub fn weak_focus_label(analysis: &PerformanceAnalysis) -> String {
    if analysis.weak_topics.is_empty() {
        ANY_TOPIC_LABEL.to_string()
    } else {
        analysis.weak_topics.join(", ")
    }
}
