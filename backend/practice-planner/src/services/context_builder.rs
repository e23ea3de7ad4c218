//! Renders the learner snapshot into the natural-language brief and the prompts
//! built around it. Everything here is a pure function of its inputs.

use std::fmt::Write as _;

use crate::models::{ContentPlan, PerformanceAnalysis};
use crate::services::content_planner::{weak_focus_label, ANY_TOPIC_LABEL};

const NONE_YET: &str = "None identified yet";

pub fn build_brief(subject: &str, analysis: &PerformanceAnalysis, augmentation: &str) -> String {
    let mut brief = format!(
        "You are an adaptive {subject} learning AI agent. Your goal is to help students \
         improve their {subject} scores by generating personalized questions.\n\n"
    );

    let _ = write!(
        brief,
        "STUDENT PROFILE:\n\
         - Total Questions Attempted: {}\n\
         - Recent Accuracy: {:.1}%\n\
         - Recommended Difficulty: {}\n\n",
        analysis.total_attempts, analysis.recent_accuracy, analysis.recommended_difficulty
    );

    let _ = write!(
        brief,
        "WEAK TOPICS (Need Focus):\n{}\n\n\
         STRONG TOPICS (Can challenge more):\n{}\n\n\
         TOPIC PERFORMANCE:\n",
        join_or_none(&analysis.weak_topics),
        join_or_none(&analysis.strong_topics)
    );

    for (topic, summary) in &analysis.topic_breakdown {
        let _ = writeln!(
            brief,
            "- {}: {:.1}% accuracy, {} attempts",
            topic, summary.accuracy, summary.attempts
        );
    }

    if !augmentation.is_empty() {
        brief.push('\n');
        brief.push_str(augmentation);
    }

    brief
}

fn join_or_none(topics: &[String]) -> String {
    if topics.is_empty() {
        NONE_YET.to_string()
    } else {
        topics.join(", ")
    }
}

pub fn question_system_prompt(subject: &str) -> String {
    format!(
        "You are an expert {subject} tutor AI that generates personalized practice questions. \
         Always respond with valid JSON."
    )
}

pub fn question_prompt(
    subject: &str,
    brief: &str,
    analysis: &PerformanceAnalysis,
    plan: &ContentPlan,
) -> String {
    let total = plan.total();
    format!(
        r#"{brief}

TASK: Generate {total} {subject} questions with the following distribution:

1. {weak} questions on WEAK TOPICS ({focus})
   - Difficulty: {difficulty} to medium
   - Focus on building fundamentals

2. {mixed} questions on MIXED TOPICS
   - Difficulty: medium
   - Help identify new weak areas

3. {strong} questions on STRONG TOPICS ({strong_focus})
   - Difficulty: hard
   - Maintain and challenge mastery

QUESTION FORMAT (JSON array):
[
  {{
    "id": 1,
    "question": "If 2x + 5 = 15, what is the value of x?",
    "options": ["5", "10", "7.5", "3"],
    "correctAnswer": 0,
    "topic": "Algebra",
    "difficulty": "easy",
    "explanation": "2x + 5 = 15, subtract 5: 2x = 10, divide by 2: x = 5",
    "reasoning": "Targeting weak algebra skills"
  }}
]

IMPORTANT:
- Respond with exactly one JSON array
- correctAnswer is the zero-based index into options
- Include clear explanations
- Vary question types within topics
- Add a "reasoning" field explaining why this question helps the student

Generate exactly {total} questions now:"#,
        weak = plan.weak_count,
        mixed = plan.mixed_count,
        strong = plan.strong_count,
        focus = weak_focus_label(analysis),
        strong_focus = if analysis.strong_topics.is_empty() {
            ANY_TOPIC_LABEL.to_string()
        } else {
            analysis.strong_topics.join(", ")
        },
        difficulty = analysis.recommended_difficulty,
    )
}

pub fn insights_system_prompt(subject: &str) -> String {
    format!("You are a supportive {subject} learning coach. Always respond with valid JSON.")
}

pub fn insights_prompt(brief: &str) -> String {
    format!(
        r#"{brief}

Based on this student's performance, provide:
1. Top 3 areas to focus on
2. Recommended study strategy
3. Motivational insight
4. Next milestone

Respond in JSON:
{{
  "focus_areas": ["area1", "area2", "area3"],
  "strategy": "Study strategy text",
  "motivation": "Motivational message",
  "next_milestone": "Goal description"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, TopicSummary};
    use crate::services::content_planner::plan_content;
    use std::collections::BTreeMap;

    fn analysis() -> PerformanceAnalysis {
        let mut topic_breakdown = BTreeMap::new();
        topic_breakdown.insert(
            "Algebra".to_string(),
            TopicSummary {
                accuracy: 90.0,
                attempts: 20,
                avg_time: 12.5,
            },
        );
        topic_breakdown.insert(
            "Grammar".to_string(),
            TopicSummary {
                accuracy: 40.0,
                attempts: 10,
                avg_time: 20.0,
            },
        );
        PerformanceAnalysis {
            total_attempts: 30,
            recent_accuracy: 72.456,
            topic_breakdown,
            weak_topics: vec!["Grammar".into()],
            strong_topics: vec!["Algebra".into()],
            recommended_difficulty: Difficulty::Medium,
        }
    }

    #[test]
    fn brief_lists_profile_and_topics() {
        let brief = build_brief("SAT", &analysis(), "");
        assert!(brief.contains("Total Questions Attempted: 30"));
        assert!(brief.contains("Recent Accuracy: 72.5%"));
        assert!(brief.contains("Recommended Difficulty: medium"));
        assert!(brief.contains("WEAK TOPICS (Need Focus):\nGrammar"));
        assert!(brief.contains("- Algebra: 90.0% accuracy, 20 attempts"));
        assert!(brief.contains("- Grammar: 40.0% accuracy, 10 attempts"));
    }

    #[test]
    fn empty_topic_lists_use_marker() {
        let mut empty = analysis();
        empty.weak_topics.clear();
        empty.strong_topics.clear();
        let brief = build_brief("SAT", &empty, "");
        assert_eq!(brief.matches("None identified yet").count(), 2);
    }

    #[test]
    fn brief_is_deterministic_and_appends_augmentation() {
        let a = build_brief("SAT", &analysis(), "\n### Reference material for Grammar:\n");
        let b = build_brief("SAT", &analysis(), "\n### Reference material for Grammar:\n");
        assert_eq!(a, b);
        assert!(a.ends_with("### Reference material for Grammar:\n"));
    }

    #[test]
    fn question_prompt_carries_the_plan() {
        let analysis = analysis();
        let plan = plan_content(10);
        let prompt = question_prompt("SAT", "BRIEF", &analysis, &plan);
        assert!(prompt.starts_with("BRIEF"));
        assert!(prompt.contains("Generate 10 SAT questions"));
        assert!(prompt.contains("6 questions on WEAK TOPICS (Grammar)"));
        assert!(prompt.contains("3 questions on MIXED TOPICS"));
        assert!(prompt.contains("1 questions on STRONG TOPICS (Algebra)"));
        assert!(prompt.contains("\"correctAnswer\": 0"));
    }

    #[test]
    fn weak_bucket_falls_back_to_various_topics() {
        let mut fresh = analysis();
        fresh.weak_topics.clear();
        let prompt = question_prompt("SAT", "", &fresh, &plan_content(5));
        assert!(prompt.contains("3 questions on WEAK TOPICS (various topics)"));
    }
}
