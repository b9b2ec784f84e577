//! crates/rc_practice_core/src/session.rs
//!
//! The practice-session state machine. `dispatch` is a pure transition function;
//! `SessionMachine` owns the current state and tells subscribers about every change.

use crate::domain::{Passage, PassageError, QuestionId};
use crate::scoring::{self, Answers};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// States and Events
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Generating,
    Active,
    Reviewed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Generating => "generating",
            SessionPhase::Active => "active",
            SessionPhase::Reviewed => "reviewed",
        };
        f.write_str(name)
    }
}

/// A session the user is currently answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: Uuid,
    pub passage: Passage,
    pub answers: Answers,
    pub elapsed_seconds: u64,
}

impl ActiveSession {
    /// Number of questions in the passage that have a selection.
    pub fn answered(&self) -> usize {
        self.passage
            .questions
            .iter()
            .filter(|q| self.answers.contains_key(&q.id))
            .count()
    }
}

/// A submitted session. Answers and elapsed time are frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedSession {
    pub session_id: Uuid,
    pub passage: Passage,
    pub answers: Answers,
    pub score: u32,
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Generating {
        session_id: Uuid,
    },
    Active(ActiveSession),
    Reviewed(ReviewedSession),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Generating { .. } => SessionPhase::Generating,
            SessionState::Active(_) => SessionPhase::Active,
            SessionState::Reviewed(_) => SessionPhase::Reviewed,
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            SessionState::Idle => None,
            SessionState::Generating { session_id } => Some(*session_id),
            SessionState::Active(a) => Some(a.session_id),
            SessionState::Reviewed(r) => Some(r.session_id),
        }
    }

    pub fn passage(&self) -> Option<&Passage> {
        match self {
            SessionState::Active(a) => Some(&a.passage),
            SessionState::Reviewed(r) => Some(&r.passage),
            _ => None,
        }
    }

    pub fn answers(&self) -> Option<&Answers> {
        match self {
            SessionState::Active(a) => Some(&a.answers),
            SessionState::Reviewed(r) => Some(&r.answers),
            _ => None,
        }
    }

    /// Present only once the session has been submitted.
    pub fn score(&self) -> Option<u32> {
        match self {
            SessionState::Reviewed(r) => Some(r.score),
            _ => None,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        match self {
            SessionState::Active(a) => a.elapsed_seconds,
            SessionState::Reviewed(r) => r.elapsed_seconds,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start {
        session_id: Uuid,
    },
    GenerationSucceeded {
        session_id: Uuid,
        passage: Passage,
    },
    GenerationFailed {
        session_id: Uuid,
        reason: String,
    },
    SelectAnswer {
        question_id: QuestionId,
        option_index: usize,
    },
    /// One second of wall-clock time for the given session's timer.
    Tick {
        session_id: Uuid,
    },
    Submit,
    Next,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start { .. } => "start",
            SessionEvent::GenerationSucceeded { .. } => "generation_succeeded",
            SessionEvent::GenerationFailed { .. } => "generation_failed",
            SessionEvent::SelectAnswer { .. } => "select_answer",
            SessionEvent::Tick { .. } => "tick",
            SessionEvent::Submit => "submit",
            SessionEvent::Next => "next",
        }
    }
}

//=========================================================================================
// Errors
//=========================================================================================

/// A rejected transition. The state the event was applied to is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a passage is already being generated")]
    GenerationInProgress,
    #[error("generated passage is invalid: {0}")]
    InvalidPassage(#[from] PassageError),
    #[error("generation result belongs to an earlier session")]
    StaleGeneration,
    #[error("only {answered} of {required} questions are answered")]
    IncompleteSubmission { answered: usize, required: usize },
    #[error("question {0} is not part of the current passage")]
    UnknownQuestionReference(QuestionId),
    #[error("question {question_id} has no option {option_index}")]
    InvalidOption {
        question_id: QuestionId,
        option_index: usize,
    },
    #[error("cannot apply '{event}' while {state}")]
    InvalidTransition {
        state: SessionPhase,
        event: &'static str,
    },
}

//=========================================================================================
// Pure Transition Function
//=========================================================================================

/// Applies `event` to `state` and returns the next state.
///
/// Ticks that do not belong to the active session are accepted and change nothing,
/// so a timer that outlives its session can never move another session's clock.
pub fn dispatch(state: &SessionState, event: SessionEvent) -> Result<SessionState, SessionError> {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Idle, E::Start { session_id }) => Ok(S::Generating { session_id }),
        (S::Generating { .. }, E::Start { .. }) => Err(SessionError::GenerationInProgress),

        (S::Generating { session_id }, E::GenerationSucceeded { session_id: id, passage }) => {
            if *session_id != id {
                return Err(SessionError::StaleGeneration);
            }
            passage.validate()?;
            Ok(S::Active(ActiveSession {
                session_id: id,
                passage,
                answers: Answers::new(),
                elapsed_seconds: 0,
            }))
        }
        (S::Generating { session_id }, E::GenerationFailed { session_id: id, .. }) => {
            if *session_id != id {
                return Err(SessionError::StaleGeneration);
            }
            Ok(S::Idle)
        }

        (S::Active(active), E::SelectAnswer { question_id, option_index }) => {
            let question = active
                .passage
                .question(question_id)
                .ok_or(SessionError::UnknownQuestionReference(question_id))?;
            if option_index >= question.options.len() {
                return Err(SessionError::InvalidOption {
                    question_id,
                    option_index,
                });
            }
            let mut next = active.clone();
            next.answers.insert(question_id, option_index);
            Ok(S::Active(next))
        }

        (S::Active(active), E::Tick { session_id }) if active.session_id == session_id => {
            let mut next = active.clone();
            next.elapsed_seconds += 1;
            Ok(S::Active(next))
        }
        (_, E::Tick { .. }) => Ok(state.clone()),

        (S::Active(active), E::Submit) => {
            let required = active.passage.questions.len();
            let answered = active.answered();
            if answered < required {
                return Err(SessionError::IncompleteSubmission { answered, required });
            }
            Ok(S::Reviewed(ReviewedSession {
                session_id: active.session_id,
                score: scoring::score(&active.passage.questions, &active.answers),
                passage: active.passage.clone(),
                answers: active.answers.clone(),
                elapsed_seconds: active.elapsed_seconds,
            }))
        }

        (S::Reviewed(_), E::Next) => Ok(S::Idle),

        (state, event) => Err(SessionError::InvalidTransition {
            state: state.phase(),
            event: event.name(),
        }),
    }
}

//=========================================================================================
// Stateful Machine with Observers
//=========================================================================================

/// Handle returned by [`SessionMachine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&SessionState) + Send + Sync>;

/// Owns one user's session and notifies subscribers after every change.
#[derive(Default)]
pub struct SessionMachine {
    state: SessionState,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Moves to `Generating` under a fresh session id and returns that id.
    pub fn start(&mut self) -> Result<Uuid, SessionError> {
        let session_id = Uuid::new_v4();
        self.dispatch(SessionEvent::Start { session_id })?;
        Ok(session_id)
    }

    /// Applies an event and returns the new state.
    ///
    /// A generated passage that fails validation is still rejected with
    /// `InvalidPassage`, but the machine drops back to `Idle` as it would for any
    /// other generation failure.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<&SessionState, SessionError> {
        match dispatch(&self.state, event) {
            Ok(next) => {
                if next != self.state {
                    self.state = next;
                    self.notify();
                }
                Ok(&self.state)
            }
            Err(SessionError::InvalidPassage(reason)) => {
                self.state = SessionState::Idle;
                self.notify();
                Err(SessionError::InvalidPassage(reason))
            }
            Err(e) => {
                if let SessionError::UnknownQuestionReference(id) = e {
                    debug!("Ignoring answer for unknown question {}", id);
                }
                Err(e)
            }
        }
    }

    fn notify(&self) {
        for (_, observer) in &self.observers {
            observer(&self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::passage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn active_machine() -> (SessionMachine, Uuid) {
        let mut machine = SessionMachine::new();
        let id = machine.start().unwrap();
        machine
            .dispatch(SessionEvent::GenerationSucceeded {
                session_id: id,
                passage: passage(),
            })
            .unwrap();
        (machine, id)
    }

    fn answer(machine: &mut SessionMachine, question_id: QuestionId, option_index: usize) {
        machine
            .dispatch(SessionEvent::SelectAnswer {
                question_id,
                option_index,
            })
            .unwrap();
    }

    #[test]
    fn full_cycle_returns_to_idle() {
        let (mut machine, id) = active_machine();
        assert_eq!(machine.state().phase(), SessionPhase::Active);
        assert_eq!(machine.state().elapsed_seconds(), 0);
        assert!(machine.state().answers().unwrap().is_empty());

        for q in 1..=4 {
            answer(&mut machine, q, (q - 1) as usize);
        }
        machine.dispatch(SessionEvent::Tick { session_id: id }).unwrap();
        machine.dispatch(SessionEvent::Submit).unwrap();
        assert_eq!(machine.state().score(), Some(4));
        assert_eq!(machine.state().elapsed_seconds(), 1);

        machine.dispatch(SessionEvent::Next).unwrap();
        assert_eq!(machine.state(), &SessionState::Idle);
    }

    #[test]
    fn reselecting_replaces_previous_answer() {
        let (mut machine, _) = active_machine();
        answer(&mut machine, 2, 0);
        answer(&mut machine, 2, 3);
        assert_eq!(machine.state().answers().unwrap().get(&2), Some(&3));
        assert_eq!(machine.state().answers().unwrap().len(), 1);
    }

    #[test]
    fn partial_submission_is_rejected_without_change() {
        let (mut machine, _) = active_machine();
        answer(&mut machine, 1, 0);
        answer(&mut machine, 2, 1);
        let before = machine.state().clone();

        let err = machine.dispatch(SessionEvent::Submit).unwrap_err();
        assert_eq!(
            err,
            SessionError::IncompleteSubmission {
                answered: 2,
                required: 4
            }
        );
        assert_eq!(machine.state(), &before);
        assert_eq!(machine.state().phase(), SessionPhase::Active);
        assert_eq!(machine.state().score(), None);
    }

    #[test]
    fn unknown_question_is_a_no_op() {
        let (mut machine, _) = active_machine();
        let before = machine.state().clone();
        let err = machine
            .dispatch(SessionEvent::SelectAnswer {
                question_id: 99,
                option_index: 0,
            })
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestionReference(99));
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn option_outside_question_is_rejected() {
        let (mut machine, _) = active_machine();
        let err = machine
            .dispatch(SessionEvent::SelectAnswer {
                question_id: 1,
                option_index: 4,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidOption { .. }));
    }

    #[test]
    fn answers_are_frozen_after_submit() {
        let (mut machine, id) = active_machine();
        for q in 1..=4 {
            answer(&mut machine, q, 0);
        }
        machine.dispatch(SessionEvent::Submit).unwrap();
        let reviewed = machine.state().clone();

        let err = machine
            .dispatch(SessionEvent::SelectAnswer {
                question_id: 1,
                option_index: 1,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        machine.dispatch(SessionEvent::Tick { session_id: id }).unwrap();
        assert_eq!(machine.state(), &reviewed);
    }

    #[test]
    fn second_start_while_generating_is_rejected() {
        let mut machine = SessionMachine::new();
        let first = machine.start().unwrap();
        assert_eq!(machine.start().unwrap_err(), SessionError::GenerationInProgress);
        assert_eq!(machine.state().session_id(), Some(first));
    }

    #[test]
    fn generation_failure_returns_to_idle() {
        let mut machine = SessionMachine::new();
        let id = machine.start().unwrap();
        machine
            .dispatch(SessionEvent::GenerationFailed {
                session_id: id,
                reason: "quota".into(),
            })
            .unwrap();
        assert_eq!(machine.state(), &SessionState::Idle);
        assert!(machine.state().passage().is_none());
    }

    #[test]
    fn malformed_passage_drops_back_to_idle() {
        let mut machine = SessionMachine::new();
        let id = machine.start().unwrap();
        let mut bad = passage();
        bad.questions[0].options.truncate(2);

        let err = machine
            .dispatch(SessionEvent::GenerationSucceeded {
                session_id: id,
                passage: bad,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidPassage(_)));
        assert_eq!(machine.state(), &SessionState::Idle);
    }

    #[test]
    fn pure_dispatch_keeps_generating_on_invalid_passage() {
        let state = SessionState::Generating {
            session_id: Uuid::nil(),
        };
        let mut bad = passage();
        bad.questions.clear();
        let err = dispatch(
            &state,
            SessionEvent::GenerationSucceeded {
                session_id: Uuid::nil(),
                passage: bad,
            },
        )
        .unwrap_err();
        assert_eq!(err, SessionError::InvalidPassage(PassageError::NoQuestions));
    }

    #[test]
    fn result_for_other_session_is_stale() {
        let mut machine = SessionMachine::new();
        machine.start().unwrap();
        let err = machine
            .dispatch(SessionEvent::GenerationSucceeded {
                session_id: Uuid::new_v4(),
                passage: passage(),
            })
            .unwrap_err();
        assert_eq!(err, SessionError::StaleGeneration);
        assert_eq!(machine.state().phase(), SessionPhase::Generating);
    }

    #[test]
    fn stale_timer_cannot_move_new_session_clock() {
        let (mut machine, old) = active_machine();
        for q in 1..=4 {
            answer(&mut machine, q, 0);
        }
        machine.dispatch(SessionEvent::Tick { session_id: old }).unwrap();
        machine.dispatch(SessionEvent::Submit).unwrap();
        machine.dispatch(SessionEvent::Next).unwrap();

        let new = machine.start().unwrap();
        machine
            .dispatch(SessionEvent::GenerationSucceeded {
                session_id: new,
                passage: passage(),
            })
            .unwrap();

        for _ in 0..3 {
            machine.dispatch(SessionEvent::Tick { session_id: old }).unwrap();
        }
        assert_eq!(machine.state().elapsed_seconds(), 0);
        machine.dispatch(SessionEvent::Tick { session_id: new }).unwrap();
        assert_eq!(machine.state().elapsed_seconds(), 1);
    }

    #[test]
    fn next_is_only_valid_after_review() {
        let (mut machine, _) = active_machine();
        let err = machine.dispatch(SessionEvent::Next).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                state: SessionPhase::Active,
                event: "next"
            }
        );
        assert!(SessionMachine::new().dispatch(SessionEvent::Submit).is_err());
    }

    #[test]
    fn observers_see_each_change_until_unsubscribed() {
        let mut machine = SessionMachine::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));

        let sink = seen.clone();
        machine.subscribe(move |state| sink.lock().unwrap().push(state.phase()));
        let counter = count.clone();
        let sub = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let id = machine.start().unwrap();
        machine
            .dispatch(SessionEvent::GenerationSucceeded {
                session_id: id,
                passage: passage(),
            })
            .unwrap();
        // Rejected and no-op events do not notify.
        let _ = machine.dispatch(SessionEvent::Submit);
        machine.dispatch(SessionEvent::Tick { session_id: Uuid::nil() }).unwrap();

        assert!(machine.unsubscribe(sub));
        assert!(!machine.unsubscribe(sub));
        answer(&mut machine, 1, 0);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionPhase::Generating, SessionPhase::Active, SessionPhase::Active]
        );
    }
}
