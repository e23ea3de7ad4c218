use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::Difficulty;

/// A practice question extracted from a generation response.
///
/// Serialized field names are the planner's wire format and must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_index"))]
pub struct GeneratedQuestion {
    /// Planner-local sequence number, assigned after validation.
    #[serde(default, skip_deserializing)]
    pub id: u32,

    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub question: String,

    #[validate(length(min = 2, message = "A question needs at least two options"))]
    pub options: Vec<String>,

    pub correct_answer: usize,

    #[validate(length(min = 1, message = "Topic must not be empty"))]
    pub topic: String,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default)]
    pub explanation: String,

    #[serde(default)]
    pub reasoning: String,
}

fn validate_answer_index(question: &GeneratedQuestion) -> Result<(), ValidationError> {
    if question.question.trim().is_empty() {
        return Err(ValidationError::new("blank_question"));
    }
    if question.correct_answer >= question.options.len() {
        return Err(ValidationError::new("correct_answer_out_of_range"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningInsights {
    pub focus_areas: Vec<String>,
    pub strategy: String,
    pub motivation: String,
    pub next_milestone: String,
}

impl LearningInsights {
    /// Used whenever the generator cannot produce usable insights.
    pub fn fallback(weak_topics: &[String]) -> Self {
        let focus_areas = if weak_topics.is_empty() {
            vec!["Keep practicing!".to_string()]
        } else {
            weak_topics.iter().take(3).cloned().collect()
        };

        Self {
            focus_areas,
            strategy: "Continue playing games to identify your strengths and weaknesses."
                .to_string(),
            motivation: "You're on the right track!".to_string(),
            next_milestone: "Complete 50 more questions".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeneratedQuestion {
        GeneratedQuestion {
            id: 1,
            question: "If 2x + 5 = 15, what is x?".into(),
            options: vec!["5".into(), "10".into(), "7.5".into(), "3".into()],
            correct_answer: 0,
            topic: "Algebra".into(),
            difficulty: Difficulty::Easy,
            explanation: "Subtract 5, divide by 2".into(),
            reasoning: "Targets linear equations".into(),
        }
    }

    #[test]
    fn serializes_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "id",
            "question",
            "options",
            "correctAnswer",
            "topic",
            "difficulty",
            "explanation",
            "reasoning",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(value["difficulty"], "easy");
    }

    #[test]
    fn rejects_out_of_range_answer() {
        let mut question = sample();
        question.correct_answer = 4;
        assert!(question.validate().is_err());
    }

    #[test]
    fn rejects_single_option() {
        let mut question = sample();
        question.options.truncate(1);
        question.correct_answer = 0;
        assert!(question.validate().is_err());
    }

    #[test]
    fn fallback_insights_use_weak_topics() {
        let weak = vec!["A".to_string(), "B".into(), "C".into(), "D".into()];
        assert_eq!(LearningInsights::fallback(&weak).focus_areas, vec!["A", "B", "C"]);
        assert_eq!(
            LearningInsights::fallback(&[]).focus_areas,
            vec!["Keep practicing!"]
        );
    }
}
