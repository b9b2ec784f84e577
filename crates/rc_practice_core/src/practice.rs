//! crates/rc_practice_core/src/practice.rs
//!
//! Orchestrates one user's practice: drives the session machine, calls the content
//! generator, scores submissions and keeps the stats store and leaderboard current.

use crate::domain::{GenerationRequest, LeaderboardEntry, Passage, QuestionId, UserProfile, UserStats};
use crate::leaderboard::{self, LEADERBOARD_SIZE};
use crate::ledger;
use crate::ports::{ContentGenerator, PortError, PortResult, StatsStore};
use crate::scoring::{self, QuestionReview};
use crate::session::{SessionError, SessionEvent, SessionMachine, SessionState, SubscriptionId};
use crate::time::{Clock, PracticeCalendar};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// Error and Report Types
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[source] PortError),
}

/// What the user sees after signing in.
#[derive(Debug)]
pub struct SignInSummary {
    /// Stats with the streak as it currently stands; `None` if they could not be read.
    pub stats: Option<UserStats>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub warnings: Vec<PracticeError>,
}

/// Outcome of a successful submission.
#[derive(Debug)]
pub struct SubmissionReport {
    pub session_id: Uuid,
    pub score: u32,
    pub total: usize,
    pub elapsed_seconds: u64,
    pub review: Vec<QuestionReview>,
    /// Updated stats, present when the user is signed in and the write went through.
    pub stats: Option<UserStats>,
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    /// Non-fatal persistence problems. The score above stands regardless.
    pub warnings: Vec<PracticeError>,
}

/// A generation call detached from the service so it can run on its own task.
pub struct GenerationJob {
    pub session_id: Uuid,
    request: GenerationRequest,
    generator: Arc<dyn ContentGenerator>,
}

impl GenerationJob {
    pub async fn run(self) -> (Uuid, PortResult<Passage>) {
        let result = self.generator.generate_passage(&self.request).await;
        (self.session_id, result)
    }
}

struct Player {
    profile: UserProfile,
    /// Last stats read from the store. `None` while they could not be loaded.
    stats: Option<UserStats>,
}

//=========================================================================================
// The Practice Service
//=========================================================================================

pub struct PracticeService {
    generator: Arc<dyn ContentGenerator>,
    store: Arc<dyn StatsStore>,
    clock: Clock,
    calendar: PracticeCalendar,
    machine: SessionMachine,
    player: Option<Player>,
}

impl PracticeService {
    pub fn new(generator: Arc<dyn ContentGenerator>, store: Arc<dyn StatsStore>) -> Self {
        Self {
            generator,
            store,
            clock: Clock::default(),
            calendar: PracticeCalendar::default(),
            machine: SessionMachine::new(),
            player: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_calendar(mut self, calendar: PracticeCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.machine.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.machine.unsubscribe(id)
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.player.as_ref().map(|p| &p.profile)
    }

    pub fn cached_stats(&self) -> Option<UserStats> {
        self.player.as_ref().and_then(|p| p.stats)
    }

    // --- Identity ---

    /// Loads (or creates) the user's stats and the current leaderboard.
    pub async fn sign_in(&mut self, profile: UserProfile) -> SignInSummary {
        info!("Signing in user {}", profile.user_id);
        let mut warnings = Vec::new();

        let stats = match self.store.read_stats(&profile.user_id).await {
            Ok(Some(stats)) => Some(stats),
            Ok(None) => {
                let fresh = UserStats::default();
                if let Err(e) = self.store.write_stats(&profile, &fresh).await {
                    warn!("Failed to create stats for {}: {}", profile.user_id, e);
                    warnings.push(PracticeError::PersistenceFailed(e));
                }
                Some(fresh)
            }
            Err(e) => {
                warn!("Failed to read stats for {}: {}", profile.user_id, e);
                warnings.push(PracticeError::PersistenceFailed(e));
                None
            }
        };

        self.player = Some(Player { profile, stats });

        let leaderboard = match self.leaderboard().await {
            Ok(board) => board,
            Err(e) => {
                warn!("Failed to load leaderboard: {}", e);
                warnings.push(PracticeError::PersistenceFailed(e));
                Vec::new()
            }
        };

        let today = self.calendar.today(&self.clock);
        let stats = stats.map(|s| UserStats {
            streak: ledger::effective_streak(&s, today),
            ..s
        });

        SignInSummary {
            stats,
            leaderboard,
            warnings,
        }
    }

    pub fn sign_out(&mut self) {
        if let Some(player) = self.player.take() {
            info!("Signed out user {}", player.profile.user_id);
        }
    }

    // --- Session lifecycle ---

    /// Moves the session to `Generating` and hands back the generator call to run.
    ///
    /// A signed-in user's stats are re-read here so the submission builds on the
    /// latest stored record; a failed read keeps whatever was cached.
    pub async fn begin(&mut self, request: GenerationRequest) -> Result<GenerationJob, PracticeError> {
        let session_id = self.machine.start()?;
        info!("Session {} started; generating passage.", session_id);

        if let Some(player) = self.player.as_mut() {
            match self.store.read_stats(&player.profile.user_id).await {
                Ok(Some(stats)) => player.stats = Some(stats),
                Ok(None) => player.stats = Some(player.stats.unwrap_or_default()),
                Err(e) => warn!("Could not refresh stats for {}: {}", player.profile.user_id, e),
            }
        }

        Ok(GenerationJob {
            session_id,
            request,
            generator: self.generator.clone(),
        })
    }

    /// Adopts a generated passage, or returns the session to idle on failure.
    pub fn complete_generation(
        &mut self,
        session_id: Uuid,
        result: PortResult<Passage>,
    ) -> Result<(), PracticeError> {
        match result {
            Ok(passage) => {
                let title = passage.passage_title.clone();
                match self.machine.dispatch(SessionEvent::GenerationSucceeded { session_id, passage }) {
                    Ok(_) => {
                        info!("Session {} is active with passage '{}'.", session_id, title);
                        Ok(())
                    }
                    Err(SessionError::InvalidPassage(reason)) => {
                        warn!("Session {} received an invalid passage: {}", session_id, reason);
                        Err(PracticeError::GenerationFailed(reason.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Session {} generation failed: {}", session_id, reason);
                self.machine.dispatch(SessionEvent::GenerationFailed {
                    session_id,
                    reason: reason.clone(),
                })?;
                Err(PracticeError::GenerationFailed(reason))
            }
        }
    }

    /// Runs a whole generation in place: `begin`, the generator call, then `complete_generation`.
    pub async fn start(&mut self, request: GenerationRequest) -> Result<(), PracticeError> {
        let job = self.begin(request).await?;
        let (session_id, result) = job.run().await;
        self.complete_generation(session_id, result)
    }

    pub fn select_answer(&mut self, question_id: QuestionId, option_index: usize) -> Result<(), PracticeError> {
        self.machine.dispatch(SessionEvent::SelectAnswer {
            question_id,
            option_index,
        })?;
        Ok(())
    }

    /// Advances the given session's timer by one second and returns the elapsed time.
    pub fn tick(&mut self, session_id: Uuid) -> u64 {
        match self.machine.dispatch(SessionEvent::Tick { session_id }) {
            Ok(state) => state.elapsed_seconds(),
            Err(_) => self.machine.state().elapsed_seconds(),
        }
    }

    /// Scores the active session and, for a signed-in user, records the result.
    pub async fn submit(&mut self) -> Result<SubmissionReport, PracticeError> {
        let reviewed = match self.machine.dispatch(SessionEvent::Submit)? {
            SessionState::Reviewed(reviewed) => reviewed.clone(),
            other => {
                return Err(SessionError::InvalidTransition {
                    state: other.phase(),
                    event: "submit",
                }
                .into())
            }
        };
        info!(
            "Session {} scored {}/{} in {}s.",
            reviewed.session_id,
            reviewed.score,
            reviewed.passage.questions.len(),
            reviewed.elapsed_seconds
        );

        let mut report = SubmissionReport {
            session_id: reviewed.session_id,
            score: reviewed.score,
            total: reviewed.passage.questions.len(),
            elapsed_seconds: reviewed.elapsed_seconds,
            review: scoring::review(&reviewed.passage.questions, &reviewed.answers),
            stats: None,
            leaderboard: None,
            warnings: Vec::new(),
        };

        let Some(player) = self.player.as_mut() else {
            return Ok(report);
        };

        // Another connection for the same user may have written since `begin`.
        let base = match self.store.read_stats(&player.profile.user_id).await {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => Some(player.stats.unwrap_or_default()),
            Err(e) => {
                warn!("Could not re-read stats for {}: {}", player.profile.user_id, e);
                player.stats
            }
        };

        match base {
            Some(prev) => {
                let today = self.calendar.today(&self.clock);
                let next = ledger::next_stats(&prev, today, reviewed.score);
                match self.store.write_stats(&player.profile, &next).await {
                    Ok(()) => {
                        player.stats = Some(next);
                        report.stats = Some(next);
                    }
                    Err(e) => {
                        warn!("Failed to save stats for {}: {}", player.profile.user_id, e);
                        report.warnings.push(PracticeError::PersistenceFailed(e));
                    }
                }
            }
            None => {
                warn!("Stats for {} were never loaded; skipping save.", player.profile.user_id);
                report.warnings.push(PracticeError::PersistenceFailed(PortError::Unavailable(
                    "stats could not be loaded for this user".to_string(),
                )));
            }
        }

        match self.leaderboard().await {
            Ok(board) => report.leaderboard = Some(board),
            Err(e) => {
                warn!("Failed to refresh leaderboard: {}", e);
                report.warnings.push(PracticeError::PersistenceFailed(e));
            }
        }

        Ok(report)
    }

    /// Discards the reviewed session.
    pub fn next(&mut self) -> Result<(), PracticeError> {
        self.machine.dispatch(SessionEvent::Next)?;
        Ok(())
    }

    // --- Leaderboard ---

    pub async fn leaderboard(&self) -> PortResult<Vec<LeaderboardEntry>> {
        let records = self.store.query_top_by_xp(LEADERBOARD_SIZE).await?;
        Ok(leaderboard::top_n(records, LEADERBOARD_SIZE))
    }
}
