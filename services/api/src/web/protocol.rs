//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for a practice session, plus the JSON views shared with the REST endpoints.

use chrono::NaiveDate;
use rc_practice_core::domain::{LeaderboardEntry, Passage, QuestionId, UserStats};
use rc_practice_core::scoring::QuestionReview;
use rc_practice_core::SubmissionReport;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks for a new passage. Without `source_text` the passage is written from scratch.
    StartSession {
        #[serde(default)]
        source_text: Option<String>,
        /// Overrides the server's default extraction setting.
        #[serde(default)]
        auto_extract: Option<bool>,
    },

    /// Selects (or changes) the answer to one question.
    SelectAnswer {
        question_id: QuestionId,
        option_index: usize,
    },

    /// Submits the answers for scoring. Every question must be answered.
    Submit,

    /// Leaves the reviewed session and returns to idle.
    Next,

    /// Re-reads the leaderboard.
    RefreshLeaderboard,

    /// Stops recording results for this connection.
    SignOut,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after connecting with an identity.
    SignedIn {
        stats: Option<StatsView>,
        leaderboard: Vec<LeaderboardEntryView>,
    },

    SignedOut,

    /// A passage is being generated. The UI can show a loading state.
    Generating { session_id: Uuid },

    /// The passage is ready and the timer has started. Answer keys are withheld.
    SessionStarted { passage: PassageView },

    /// One second has passed in the active session.
    TimerTick {
        session_id: Uuid,
        elapsed_seconds: u64,
        display: String,
    },

    AnswerRecorded {
        question_id: QuestionId,
        option_index: usize,
    },

    /// Submission was refused because some questions are unanswered.
    SubmissionRejected { answered: usize, required: usize },

    /// The session has been scored; answer keys and explanations are revealed.
    SessionReviewed {
        session_id: Uuid,
        score: u32,
        total: usize,
        elapsed_seconds: u64,
        review: Vec<QuestionReviewView>,
        stats: Option<StatsView>,
    },

    Leaderboard { entries: Vec<LeaderboardEntryView> },

    /// The session was discarded; the client is back at the start screen.
    SessionReset,

    /// Something went wrong that did not affect the session (e.g. stats were not saved).
    Warning { message: String },

    /// A request could not be carried out.
    Error { message: String },
}

//=========================================================================================
// Views
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct StatsView {
    pub xp: u64,
    pub streak: u32,
    pub tests_taken: u32,
    pub last_practice_date: Option<NaiveDate>,
}

impl From<UserStats> for StatsView {
    fn from(stats: UserStats) -> Self {
        Self {
            xp: stats.xp,
            streak: stats.streak,
            tests_taken: stats.tests_taken,
            last_practice_date: stats.last_practice_date,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct LeaderboardEntryView {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub xp: u64,
    pub streak: u32,
}

impl From<LeaderboardEntry> for LeaderboardEntryView {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            user_id: entry.user_id.to_string(),
            display_name: entry.display_name,
            avatar_url: entry.avatar_url,
            xp: entry.xp,
            streak: entry.streak,
        }
    }
}

pub fn leaderboard_views(entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntryView> {
    entries.into_iter().map(LeaderboardEntryView::from).collect()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub question_text: String,
    pub options: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PassageView {
    pub session_id: Uuid,
    pub passage_title: String,
    pub paragraphs: Vec<String>,
    pub questions: Vec<QuestionView>,
}

impl PassageView {
    pub fn new(session_id: Uuid, passage: &Passage) -> Self {
        Self {
            session_id,
            passage_title: passage.passage_title.clone(),
            paragraphs: passage.paragraphs().into_iter().map(str::to_string).collect(),
            questions: passage
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id,
                    question_text: q.question_text.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuestionReviewView {
    pub question_id: QuestionId,
    pub selected_option_index: Option<usize>,
    pub correct_option_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

impl From<QuestionReview> for QuestionReviewView {
    fn from(review: QuestionReview) -> Self {
        Self {
            question_id: review.question_id,
            selected_option_index: review.selected_option_index,
            correct_option_index: review.correct_option_index,
            is_correct: review.is_correct,
            explanation: review.explanation,
        }
    }
}

impl ServerMessage {
    pub fn reviewed(report: &SubmissionReport) -> Self {
        ServerMessage::SessionReviewed {
            session_id: report.session_id,
            score: report.score,
            total: report.total,
            elapsed_seconds: report.elapsed_seconds,
            review: report.review.iter().cloned().map(QuestionReviewView::from).collect(),
            stats: report.stats.map(StatsView::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_practice_core::domain::Question;
    use serde_json::json;

    #[test]
    fn parses_client_messages() {
        let start: ClientMessage =
            serde_json::from_value(json!({"type": "start_session", "source_text": "Editorial"})).unwrap();
        assert_eq!(
            start,
            ClientMessage::StartSession {
                source_text: Some("Editorial".into()),
                auto_extract: None
            }
        );

        let bare: ClientMessage = serde_json::from_value(json!({"type": "start_session"})).unwrap();
        assert_eq!(
            bare,
            ClientMessage::StartSession {
                source_text: None,
                auto_extract: None
            }
        );

        let select: ClientMessage =
            serde_json::from_value(json!({"type": "select_answer", "question_id": 3, "option_index": 1}))
                .unwrap();
        assert_eq!(
            select,
            ClientMessage::SelectAnswer {
                question_id: 3,
                option_index: 1
            }
        );

        let submit: ClientMessage = serde_json::from_value(json!({"type": "submit"})).unwrap();
        assert_eq!(submit, ClientMessage::Submit);
    }

    #[test]
    fn passage_view_withholds_answer_key() {
        let passage = Passage {
            passage_title: "T".into(),
            extracted_text: "One.\n\nTwo.".into(),
            questions: vec![Question {
                id: 1,
                question_text: "Q?".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option_index: 2,
                explanation: "secret".into(),
            }],
        };
        let message = ServerMessage::SessionStarted {
            passage: PassageView::new(Uuid::nil(), &passage),
        };
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "session_started");
        assert_eq!(value["passage"]["paragraphs"], json!(["One.", "Two."]));
        let text = value.to_string();
        assert!(!text.contains("correct_option_index"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn unit_messages_serialize_with_tag_only() {
        let value = serde_json::to_value(ServerMessage::SessionReset).unwrap();
        assert_eq!(value, json!({"type": "session_reset"}));
    }
}
