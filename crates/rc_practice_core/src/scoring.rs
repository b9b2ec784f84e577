//! crates/rc_practice_core/src/scoring.rs
//!
//! Scores a submitted answer set against the passage's answer key.

use crate::domain::{Question, QuestionId};
use std::collections::BTreeMap;

/// The user's selections, keyed by question id. Unanswered questions are absent.
pub type Answers = BTreeMap<QuestionId, usize>;

/// Counts the questions whose selected option matches the answer key.
/// Unanswered questions never match.
pub fn score(questions: &[Question], answers: &Answers) -> u32 {
    questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_option_index))
        .count() as u32
}

/// Per-question outcome shown once a session has been reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub selected_option_index: Option<usize>,
    pub correct_option_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

pub fn review(questions: &[Question], answers: &Answers) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|q| {
            let selected = answers.get(&q.id).copied();
            QuestionReview {
                question_id: q.id,
                selected_option_index: selected,
                correct_option_index: q.correct_option_index,
                is_correct: selected == Some(q.correct_option_index),
                explanation: q.explanation.clone(),
            }
        })
        .collect()
}
