//! crates/rc_practice_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

/// Number of options every question must carry. The option position is the answer key.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Number of questions the generation contract asks for.
pub const QUESTIONS_PER_PASSAGE: usize = 4;

//=========================================================================================
// Identity
//=========================================================================================

/// An opaque user identity handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display attributes for a user. Passed through to the store and leaderboard untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            avatar_url: None,
        }
    }
}

//=========================================================================================
// Passage and Questions
//=========================================================================================

/// Stable ordinal of a question within its passage.
pub type QuestionId = u32;

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub explanation: String,
}

/// A generated reading passage with its question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub passage_title: String,
    pub extracted_text: String,
    pub questions: Vec<Question>,
}

/// Reasons a generated passage cannot be adopted into a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassageError {
    #[error("passage text is empty")]
    EmptyText,
    #[error("passage has no questions")]
    NoQuestions,
    #[error("question {question_id} has {found} options, expected 4")]
    WrongOptionCount { question_id: QuestionId, found: usize },
    #[error("question {question_id} marks option {index} as correct, which does not exist")]
    CorrectOptionOutOfRange { question_id: QuestionId, index: usize },
    #[error("question id {0} appears more than once")]
    DuplicateQuestionId(QuestionId),
}

impl Passage {
    /// Checks the shape promised by the generation contract.
    ///
    /// The question count is not pinned to [`QUESTIONS_PER_PASSAGE`]; generators
    /// occasionally return more or fewer and those sets are still playable.
    pub fn validate(&self) -> Result<(), PassageError> {
        if self.extracted_text.trim().is_empty() {
            return Err(PassageError::EmptyText);
        }
        if self.questions.is_empty() {
            return Err(PassageError::NoQuestions);
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id) {
                return Err(PassageError::DuplicateQuestionId(question.id));
            }
            if question.options.len() != OPTIONS_PER_QUESTION {
                return Err(PassageError::WrongOptionCount {
                    question_id: question.id,
                    found: question.options.len(),
                });
            }
            if question.correct_option_index >= question.options.len() {
                return Err(PassageError::CorrectOptionOutOfRange {
                    question_id: question.id,
                    index: question.correct_option_index,
                });
            }
        }
        Ok(())
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Splits the passage body on blank lines, dropping empty paragraphs.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.extracted_text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

//=========================================================================================
// Generation Request
//=========================================================================================

/// What the user asked the content generator for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Raw text pasted by the user. `None` asks for a passage written from scratch.
    pub source_text: Option<String>,
    /// Pull the main editorial out of noisy input instead of using it verbatim.
    pub auto_extract: bool,
    /// Publication whose editorial style a from-scratch passage should imitate.
    pub style_source: Option<String>,
}

//=========================================================================================
// Gamification
//=========================================================================================

/// Persisted experience/streak bookkeeping for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub xp: u64,
    pub streak: u32,
    pub tests_taken: u32,
    /// `None` means the user has never submitted a session.
    pub last_practice_date: Option<NaiveDate>,
}

/// A user's stats together with who they belong to, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    pub profile: UserProfile,
    pub stats: UserStats,
}

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub xp: u64,
    pub streak: u32,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn well_formed_passage_validates() {
        assert_eq!(passage().validate(), Ok(()));
    }

    #[test]
    fn fewer_questions_are_tolerated() {
        let mut p = passage();
        p.questions.truncate(2);
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn rejects_missing_questions() {
        let mut p = passage();
        p.questions.clear();
        assert_eq!(p.validate(), Err(PassageError::NoQuestions));
    }

    #[test]
    fn rejects_three_options() {
        let mut p = passage();
        p.questions[1].options.pop();
        assert_eq!(
            p.validate(),
            Err(PassageError::WrongOptionCount { question_id: 2, found: 3 })
        );
    }

    #[test]
    fn rejects_out_of_range_answer_key() {
        let mut p = passage();
        p.questions[0].correct_option_index = 4;
        assert_eq!(
            p.validate(),
            Err(PassageError::CorrectOptionOutOfRange { question_id: 1, index: 4 })
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut p = passage();
        p.questions[3].id = 1;
        assert_eq!(p.validate(), Err(PassageError::DuplicateQuestionId(1)));
    }

    #[test]
    fn rejects_blank_text() {
        let mut p = passage();
        p.extracted_text = "  \n ".into();
        assert_eq!(p.validate(), Err(PassageError::EmptyText));
    }

    #[test]
    fn paragraphs_skip_blank_runs() {
        let mut p = passage();
        p.extracted_text = "One.\n\n\n\nTwo.\n\n".into();
        assert_eq!(p.paragraphs(), vec!["One.", "Two."]);
    }
}
