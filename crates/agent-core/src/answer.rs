//! Structured answer contract.
//!
//! The single place where model free text becomes a typed value. The model
//! is told (via [`structured_answer_instructions`]) to emit a JSON object
//! with `analysis` and `answer` fields; [`parse_structured_answer`] turns
//! the terminal assistant message back into that shape or fails with
//! [`AgentError::MalformedAnswer`].

use serde::{Deserialize, Serialize};

use crate::agent::error::AgentError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredAnswer {
    /// Reasoning the model performed before answering.
    pub analysis: String,
    /// The final answer, returned to the caller.
    pub answer: String,
}

/// Format instructions embedded in the system directive.
pub fn structured_answer_instructions() -> String {
    r#"Your final reply MUST be a single JSON object with exactly these fields:
{"analysis": "<your reasoning before answering>", "answer": "<the final answer>"}
You may wrap the object in a ```json fenced block. Do not add any other fields."#
        .to_string()
}

/// Parses the terminal assistant message into a [`StructuredAnswer`].
///
/// Extraction strategies, in order: the whole text as JSON, the contents of
/// a fenced code block, the first balanced `{...}` object. Anything else is
/// a `MalformedAnswer`, never a silent fallback to raw text.
pub fn parse_structured_answer(raw: &str) -> Result<StructuredAnswer, AgentError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AgentError::MalformedAnswer(
            "terminal message was empty".to_string(),
        ));
    }

    if let Ok(answer) = serde_json::from_str::<StructuredAnswer>(trimmed) {
        return Ok(answer);
    }

    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(answer) = serde_json::from_str::<StructuredAnswer>(block.trim()) {
            return Ok(answer);
        }
    }

    if let Some(object) = extract_first_object(trimmed) {
        if let Ok(answer) = serde_json::from_str::<StructuredAnswer>(object) {
            return Ok(answer);
        }
    }

    Err(AgentError::MalformedAnswer(format!(
        "no {{analysis, answer}} object found in {} chars of model output",
        trimmed.len()
    )))
}

/// Returns the body of the first ``` fenced block, tolerating a language tag.
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Returns the first brace-balanced object in the text.
///
/// Tracks string literals so braces inside field values do not unbalance
/// the scan.
fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
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

    #[test]
    fn parses_bare_json() {
        let answer =
            parse_structured_answer(r#"{"analysis": "3123123 + 5123123", "answer": "8246246"}"#)
                .unwrap();
        assert_eq!(answer.analysis, "3123123 + 5123123");
        assert_eq!(answer.answer, "8246246");
    }

    #[test]
    fn parses_fenced_block_with_surrounding_prose() {
        let raw = "Here is the result:\n```json\n{\"analysis\": \"a\", \"answer\": \"b\"}\n```\nDone.";
        let answer = parse_structured_answer(raw).unwrap();
        assert_eq!(answer.answer, "b");
    }

    #[test]
    fn parses_embedded_object_with_braces_in_strings() {
        let raw = r#"Sure: {"analysis": "used {k: 1}", "answer": "42"} hope that helps"#;
        let answer = parse_structured_answer(raw).unwrap();
        assert_eq!(answer.answer, "42");
    }

    #[test]
    fn round_trips_instruction_compliant_text() {
        let compliant = serde_json::to_string(&StructuredAnswer {
            analysis: "looked it up".to_string(),
            answer: "8246246".to_string(),
        })
        .unwrap();

        let answer = parse_structured_answer(&compliant).unwrap();
        assert!(!answer.answer.is_empty());
    }

    #[test]
    fn plain_prose_is_malformed() {
        let result = parse_structured_answer("The sum is 8246246.");
        assert!(matches!(result, Err(AgentError::MalformedAnswer(_))));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(
            parse_structured_answer("   "),
            Err(AgentError::MalformedAnswer(_))
        ));
    }
}
