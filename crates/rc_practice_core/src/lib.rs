//! crates/rc_practice_core/src/lib.rs
//!
//! The practice domain: passages, sessions, scoring, streaks and the ports the
//! service layer implements.

pub mod domain;
pub mod generation;
pub mod leaderboard;
pub mod ledger;
pub mod ports;
pub mod practice;
pub mod scoring;
pub mod session;
pub mod time;

pub use domain::{
    GenerationRequest, LeaderboardEntry, Passage, PassageError, Question, QuestionId, StatsRecord, UserId,
    UserProfile, UserStats,
};
pub use generation::FallbackGenerator;
pub use ports::{ContentGenerator, PortError, PortResult, StatsStore};
pub use practice::{GenerationJob, PracticeError, PracticeService, SignInSummary, SubmissionReport};
pub use session::{SessionError, SessionEvent, SessionMachine, SessionPhase, SessionState};
pub use time::{Clock, PracticeCalendar};
