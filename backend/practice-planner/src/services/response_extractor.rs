//! Tolerant extraction of JSON payloads from free-form generator replies.
//!
//! Replies often wrap the payload in prose or code fences. Instead of slicing
//! between the first `[` and the last `]`, each opening bracket is tried in
//! order and matched with a string-aware balanced scan; the first span that
//! parses as the expected shape wins. Scanning stops at the first opener that
//! never closes, since every later opener sits inside it.

use serde_json::{Map, Value};
use tracing::warn;
use validator::Validate;

use crate::error::ExtractionError;
use crate::models::GeneratedQuestion;

/// Returns the first JSON object embedded in `text`.
pub fn extract_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    let mut last_error = None;

    for span in candidate_spans(text, b'{', b'}') {
        match serde_json::from_str::<Map<String, Value>>(span) {
            Ok(map) => return Ok(map),
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.map_or(ExtractionError::NoJsonObject, ExtractionError::InvalidJson))
}

#[derive(Debug, Default)]
pub struct ParsedQuestions {
    pub questions: Vec<GeneratedQuestion>,
    pub rejected: usize,
}

/// Extracts, deserializes and validates questions. Items that fail either
/// step are dropped; survivors are numbered `1..=n` in response order.
///
/// An array of objects with no valid question (a format example echoed back,
/// say) does not end the search; later arrays are still tried. When none of
/// them yields a question the first one's rejection count is reported.
pub fn parse_questions(text: &str) -> Result<ParsedQuestions, ExtractionError> {
    let mut last_error = None;
    let mut first_empty = None;

    for span in candidate_spans(text, b'[', b']') {
        match object_items(span) {
            Ok(Some(items)) => {
                let parsed = validate_questions(items);
                if !parsed.questions.is_empty() {
                    return Ok(parsed);
                }
                first_empty.get_or_insert(parsed);
            }
            Ok(None) => continue,
            Err(err) => last_error = Some(err),
        }
    }

    first_empty.ok_or_else(|| {
        last_error.map_or(ExtractionError::NoJsonArray, ExtractionError::InvalidJson)
    })
}

fn validate_questions(items: Vec<Map<String, Value>>) -> ParsedQuestions {
    let mut parsed = ParsedQuestions::default();

    for (index, item) in items.into_iter().enumerate() {
        let question = serde_json::from_value::<GeneratedQuestion>(Value::Object(item))
            .map_err(|err| err.to_string())
            .and_then(|q| q.validate().map(|_| q).map_err(|err| err.to_string()));

        match question {
            Ok(mut question) => {
                question.id = parsed.questions.len() as u32 + 1;
                parsed.questions.push(question);
            }
            Err(reason) => {
                warn!(index, %reason, "Dropping invalid generated question");
                parsed.rejected += 1;
            }
        }
    }

    parsed
}

/// `Some` when `span` is a non-empty array whose items are all objects.
fn object_items(span: &str) -> Result<Option<Vec<Map<String, Value>>>, serde_json::Error> {
    let items = serde_json::from_str::<Vec<Value>>(span)?;
    if items.is_empty() || !items.iter().all(Value::is_object) {
        return Ok(None);
    }
    Ok(Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
    ))
}

/// Balanced spans starting at each `open` in order, up to the first that
/// never closes.
fn candidate_spans(text: &str, open: u8, close: u8) -> impl Iterator<Item = &str> + '_ {
    positions(text, open)
        .map_while(move |start| balanced_end(text, start, open, close).map(|end| &text[start..=end]))
}

fn positions(text: &str, needle: u8) -> impl Iterator<Item = usize> + '_ {
    text.bytes()
        .enumerate()
        .filter(move |(_, b)| *b == needle)
        .map(|(i, _)| i)
}

/// Index of the bracket closing the one at `start`, ignoring brackets inside
/// JSON string literals.
fn balanced_end(text: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_QUESTION: &str = r#"{"id":1,"question":"2+2?","options":["3","4"],"correctAnswer":1,"topic":"Arithmetic","difficulty":"easy","explanation":"Add","reasoning":"Warm-up"}"#;

    #[test]
    fn extracts_array_wrapped_in_prose() {
        let text = format!("Sure! [ {} ] Thanks", ONE_QUESTION);
        let parsed = parse_questions(&text).unwrap();
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].options[parsed.questions[0].correct_answer], "4");
    }

    #[test]
    fn no_brackets_is_an_error_not_a_panic() {
        assert!(matches!(
            parse_questions("I cannot help with that."),
            Err(ExtractionError::NoJsonArray)
        ));
    }

    #[test]
    fn skips_bracketed_prose_before_payload() {
        let text = format!(
            "As noted in [1], here you go:\n```json\n[{}]\n```\nSee also [2].",
            ONE_QUESTION
        );
        assert_eq!(parse_questions(&text).unwrap().questions.len(), 1);
    }

    #[test]
    fn brackets_inside_strings_do_not_confuse_the_scan() {
        let item = r#"{"question":"Which is a list: [a] or (a]?","options":["[a]","(a]"],"correctAnswer":0,"topic":"Logic"}"#;
        let parsed = parse_questions(&format!("[{}]", item)).unwrap();
        assert_eq!(parsed.questions[0].options[0], "[a]");
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let text = format!("[{}, {{\"question\": \"cut off", ONE_QUESTION);
        assert!(parse_questions(&text).is_err());
    }

    #[test]
    fn invalid_items_are_dropped_and_ids_resequenced() {
        let bad = r#"{"question":"Only one option","options":["x"],"correctAnswer":0,"topic":"T"}"#;
        let text = format!("[{bad}, {ONE_QUESTION}, {ONE_QUESTION}]");
        let parsed = parse_questions(&text).unwrap();
        assert_eq!(parsed.rejected, 1);
        let ids: Vec<u32> = parsed.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn echoed_format_example_does_not_hide_the_payload() {
        let text = format!(
            "Use the format [{{\"id\": 1, \"question\": \"...\"}}]. Here they are:\n[{}]",
            ONE_QUESTION
        );
        let parsed = parse_questions(&text).unwrap();
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.rejected, 0);
        assert_eq!(parsed.questions[0].topic, "Arithmetic");
    }

    #[test]
    fn array_with_no_valid_question_reports_rejections() {
        let parsed = parse_questions(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert!(parsed.questions.is_empty());
        assert_eq!(parsed.rejected, 2);
    }

    #[test]
    fn unclosed_openers_end_the_scan() {
        let text = format!("{}[{}]", "[".repeat(20_000), ONE_QUESTION);
        assert!(matches!(
            parse_questions(&text),
            Err(ExtractionError::NoJsonArray)
        ));

        let text = format!("{}{{\"a\": 1}}", "{".repeat(20_000));
        assert!(matches!(
            extract_object(&text),
            Err(ExtractionError::NoJsonObject)
        ));
    }

    #[test]
    fn extracts_first_object() {
        let text = "Here: {\"focus_areas\": [\"Grammar\"], \"strategy\": \"s {x}\"} done";
        let map = extract_object(text).unwrap();
        assert_eq!(map["strategy"], "s {x}");
    }

    #[test]
    fn missing_object_is_reported() {
        assert!(matches!(
            extract_object("nothing here"),
            Err(ExtractionError::NoJsonObject)
        ));
    }
}
