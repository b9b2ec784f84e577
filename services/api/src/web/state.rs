//! services/api/src/web/state.rs
//!
//! Defines the application's shared and connection-specific states.

use crate::config::Config;
use crate::web::timer_task::timer_process;
use rc_practice_core::domain::{GenerationRequest, Passage};
use rc_practice_core::ports::{ContentGenerator, PortResult, StatsStore};
use rc_practice_core::{Clock, PracticeCalendar, PracticeService};
use std::sync::Arc;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<dyn StatsStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub config: Arc<Config>,
    pub clock: Clock,
    pub calendar: PracticeCalendar,
}

impl AppState {
    /// A fresh practice service for one connection.
    pub fn practice_service(&self) -> PracticeService {
        PracticeService::new(self.generator.clone(), self.stats.clone())
            .with_clock(self.clock)
            .with_calendar(self.calendar)
    }

    /// Fills in the server defaults for a client's start request.
    pub fn generation_request(
        &self,
        source_text: Option<String>,
        auto_extract: Option<bool>,
    ) -> GenerationRequest {
        let source_text = source_text.filter(|text| !text.trim().is_empty());
        GenerationRequest {
            auto_extract: auto_extract.unwrap_or(self.config.auto_extract),
            style_source: self.config.daily_source.clone(),
            source_text,
        }
    }
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// Work finished on a background task and handed back to the connection loop.
#[derive(Debug)]
pub enum ConnectionEvent {
    Generated {
        session_id: Uuid,
        result: PortResult<Passage>,
    },
    Tick {
        session_id: Uuid,
    },
}

/// The state for a single, active WebSocket connection.
pub struct ConnectionState {
    pub practice: PracticeService,
    /// Cancels the timer of the current session.
    timer_token: Option<CancellationToken>,
    generation_task: Option<JoinHandle<()>>,
}

impl ConnectionState {
    pub fn new(practice: PracticeService) -> Self {
        Self {
            practice,
            timer_token: None,
            generation_task: None,
        }
    }

    /// Starts a one-second timer for `session_id`, stopping any timer already running.
    pub fn start_timer(&mut self, session_id: Uuid, events: UnboundedSender<ConnectionEvent>) {
        self.stop_timer();
        let token = CancellationToken::new();
        self.timer_token = Some(token.clone());
        tokio::spawn(timer_process(session_id, events, token));
    }

    pub fn stop_timer(&mut self) {
        if let Some(token) = self.timer_token.take() {
            debug!("Stopping session timer.");
            token.cancel();
        }
    }

    pub fn timer_running(&self) -> bool {
        self.timer_token.is_some()
    }

    pub fn track_generation(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.generation_task.replace(handle) {
            previous.abort();
        }
    }

    /// Stops everything the connection has running in the background.
    pub fn shutdown(&mut self) {
        self.stop_timer();
        if let Some(handle) = self.generation_task.take() {
            handle.abort();
        }
    }
}
