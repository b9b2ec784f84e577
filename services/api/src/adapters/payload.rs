//! services/api/src/adapters/payload.rs
//!
//! Parses the passage JSON produced by the content generator into the core
//! `Passage` type. Both generator adapters funnel their raw text through here.

use rc_practice_core::domain::{Passage, Question};
use rc_practice_core::ports::{PortError, PortResult};
use serde::Deserialize;

//=========================================================================================
// "Impure" Payload Structs
//=========================================================================================

#[derive(Deserialize)]
struct PassagePayload {
    passage_title: String,
    extracted_text: String,
    questions: Vec<QuestionPayload>,
}

#[derive(Deserialize)]
struct QuestionPayload {
    id: u32,
    question_text: String,
    options: Vec<String>,
    correct_option_index: usize,
    #[serde(default)]
    explanation: String,
}

impl PassagePayload {
    fn to_domain(self) -> Passage {
        Passage {
            passage_title: self.passage_title,
            extracted_text: self.extracted_text,
            questions: self.questions.into_iter().map(QuestionPayload::to_domain).collect(),
        }
    }
}

impl QuestionPayload {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            question_text: self.question_text,
            options: self.options,
            correct_option_index: self.correct_option_index,
            explanation: self.explanation,
        }
    }
}

//=========================================================================================
// Parsing
//=========================================================================================

/// Drops a surrounding markdown code fence (```json ... ```) if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses and validates a generated passage.
///
/// Anything that is not valid JSON, lacks a field, or breaks the passage shape is
/// reported as `PortError::Malformed`.
pub fn parse_passage(text: &str) -> PortResult<Passage> {
    let payload: PassagePayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| PortError::Malformed(format!("passage JSON: {}", e)))?;
    let passage = payload.to_domain();
    passage
        .validate()
        .map_err(|e| PortError::Malformed(e.to_string()))?;
    Ok(passage)
}
