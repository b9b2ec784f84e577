//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It drives the connection's practice service and delegates generation and
//! timing to background tasks that report back over a channel.

use crate::web::{
    middleware::Identity,
    protocol::{leaderboard_views, ClientMessage, PassageView, ServerMessage, StatsView},
    state::{AppState, ConnectionEvent, ConnectionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use rc_practice_core::{PracticeError, SessionError, SessionPhase};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = SplitSink<WebSocket, Message>;
type SendResult = Result<(), axum::Error>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    match &identity.0 {
        Some(profile) => info!("New WebSocket connection established for user: {}", profile.user_id),
        None => info!("New anonymous WebSocket connection established."),
    }

    let (mut sender, mut receiver) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ConnectionEvent>();
    let mut connection = ConnectionState::new(app_state.practice_service());

    // --- 1. Initialization Phase ---
    if let Err(e) = greet(identity, &mut connection, &mut sender).await {
        error!("Failed to send the initial state: {}", e);
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        let outcome = tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_text_message(text.as_str(), &app_state, &mut connection, &mut sender, &events_tx).await
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            Some(event) = events_rx.recv() => {
                handle_connection_event(event, &mut connection, &mut sender, &events_tx).await
            }
        };

        if let Err(e) = outcome {
            error!("Failed to send to client: {}. Closing connection.", e);
            break;
        }
    }

    // --- 3. Cleanup ---
    connection.shutdown();
    info!("WebSocket connection closed.");
}

/// Signs the user in (if the connection carries an identity) and sends the starting state.
async fn greet(identity: Identity, connection: &mut ConnectionState, sender: &mut WsSender) -> SendResult {
    let messages = match identity.0 {
        Some(profile) => {
            let summary = connection.practice.sign_in(profile).await;
            let mut messages = vec![ServerMessage::SignedIn {
                stats: summary.stats.map(StatsView::from),
                leaderboard: leaderboard_views(summary.leaderboard),
            }];
            messages.extend(warnings(&summary.warnings));
            messages
        }
        None => match connection.practice.leaderboard().await {
            Ok(entries) => vec![ServerMessage::Leaderboard {
                entries: leaderboard_views(entries),
            }],
            Err(e) => {
                warn!("Failed to load leaderboard: {}", e);
                Vec::new()
            }
        },
    };
    send_all(sender, &messages).await
}

/// Helper function to parse a text frame and answer it.
async fn handle_text_message(
    text: &str,
    app_state: &AppState,
    connection: &mut ConnectionState,
    sender: &mut WsSender,
    events_tx: &UnboundedSender<ConnectionEvent>,
) -> SendResult {
    let messages = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => apply_client_message(client_msg, app_state, connection, events_tx).await,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            vec![error_message("Unrecognised message.")]
        }
    };
    send_all(sender, &messages).await
}

async fn handle_connection_event(
    event: ConnectionEvent,
    connection: &mut ConnectionState,
    sender: &mut WsSender,
    events_tx: &UnboundedSender<ConnectionEvent>,
) -> SendResult {
    let messages = apply_connection_event(event, connection, events_tx);
    send_all(sender, &messages).await
}

//=========================================================================================
// Connection Logic
//=========================================================================================

/// Applies one client message to the connection and returns the replies, in order.
pub(crate) async fn apply_client_message(
    client_msg: ClientMessage,
    app_state: &AppState,
    connection: &mut ConnectionState,
    events_tx: &UnboundedSender<ConnectionEvent>,
) -> Vec<ServerMessage> {
    match client_msg {
        ClientMessage::StartSession {
            source_text,
            auto_extract,
        } => {
            let request = app_state.generation_request(source_text, auto_extract);
            match connection.practice.begin(request).await {
                Ok(job) => {
                    let session_id = job.session_id;
                    let events = events_tx.clone();
                    let handle = tokio::spawn(async move {
                        let (session_id, result) = job.run().await;
                        // The connection may already be gone.
                        let _ = events.send(ConnectionEvent::Generated { session_id, result });
                    });
                    connection.track_generation(handle);
                    vec![ServerMessage::Generating { session_id }]
                }
                Err(e) => vec![error_message(&e.to_string())],
            }
        }
        ClientMessage::SelectAnswer {
            question_id,
            option_index,
        } => match connection.practice.select_answer(question_id, option_index) {
            Ok(()) => vec![ServerMessage::AnswerRecorded {
                question_id,
                option_index,
            }],
            Err(PracticeError::Session(SessionError::UnknownQuestionReference(_))) => Vec::new(),
            Err(e) => vec![error_message(&e.to_string())],
        },
        ClientMessage::Submit => match connection.practice.submit().await {
            Ok(report) => {
                connection.stop_timer();
                let mut messages = vec![ServerMessage::reviewed(&report)];
                if let Some(entries) = report.leaderboard {
                    messages.push(ServerMessage::Leaderboard {
                        entries: leaderboard_views(entries),
                    });
                }
                messages.extend(warnings(&report.warnings));
                messages
            }
            Err(PracticeError::Session(SessionError::IncompleteSubmission { answered, required })) => {
                vec![ServerMessage::SubmissionRejected { answered, required }]
            }
            Err(e) => vec![error_message(&e.to_string())],
        },
        ClientMessage::Next => match connection.practice.next() {
            Ok(()) => {
                connection.stop_timer();
                vec![ServerMessage::SessionReset]
            }
            Err(e) => vec![error_message(&e.to_string())],
        },
        ClientMessage::RefreshLeaderboard => match connection.practice.leaderboard().await {
            Ok(entries) => vec![ServerMessage::Leaderboard {
                entries: leaderboard_views(entries),
            }],
            Err(e) => {
                warn!("Failed to load leaderboard: {}", e);
                vec![ServerMessage::Warning {
                    message: "The leaderboard is unavailable right now.".to_string(),
                }]
            }
        },
        ClientMessage::SignOut => {
            connection.practice.sign_out();
            vec![ServerMessage::SignedOut]
        }
    }
}

/// Applies a result handed back by a background task and returns the replies.
pub(crate) fn apply_connection_event(
    event: ConnectionEvent,
    connection: &mut ConnectionState,
    events_tx: &UnboundedSender<ConnectionEvent>,
) -> Vec<ServerMessage> {
    match event {
        ConnectionEvent::Generated { session_id, result } => {
            match connection.practice.complete_generation(session_id, result) {
                Ok(()) => {
                    let Some(view) = connection
                        .practice
                        .state()
                        .passage()
                        .map(|passage| PassageView::new(session_id, passage))
                    else {
                        return Vec::new();
                    };
                    connection.start_timer(session_id, events_tx.clone());
                    vec![ServerMessage::SessionStarted { passage: view }]
                }
                Err(PracticeError::Session(SessionError::StaleGeneration)) => {
                    debug!("Dropping passage for stale session {}.", session_id);
                    Vec::new()
                }
                Err(e) => vec![error_message(&e.to_string())],
            }
        }
        ConnectionEvent::Tick { session_id } => {
            if !is_running(connection, session_id) {
                debug!("Ignoring tick for session {}.", session_id);
                return Vec::new();
            }
            let elapsed_seconds = connection.practice.tick(session_id);
            vec![ServerMessage::TimerTick {
                session_id,
                elapsed_seconds,
                display: rc_practice_core::time::format_elapsed(elapsed_seconds),
            }]
        }
    }
}

fn is_running(connection: &ConnectionState, session_id: Uuid) -> bool {
    let state = connection.practice.state();
    state.phase() == SessionPhase::Active && state.session_id() == Some(session_id)
}

fn error_message(message: &str) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

fn warnings(warnings: &[PracticeError]) -> impl Iterator<Item = ServerMessage> + '_ {
    warnings.iter().map(|warning| ServerMessage::Warning {
        message: warning.to_string(),
    })
}

//=========================================================================================
// Sending
//=========================================================================================

async fn send_message(sender: &mut WsSender, message: &ServerMessage) -> SendResult {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

async fn send_all(sender: &mut WsSender, messages: &[ServerMessage]) -> SendResult {
    for message in messages {
        send_message(sender, message).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::test_support::{app_state, app_state_with, Canned};
    use rc_practice_core::domain::{UserId, UserProfile};

    fn start() -> ClientMessage {
        ClientMessage::StartSession {
            source_text: None,
            auto_extract: None,
        }
    }

    /// Starts a session and feeds the generation result back in, as the socket loop would.
    async fn started_session(
        state: &AppState,
        connection: &mut ConnectionState,
        events_tx: &UnboundedSender<ConnectionEvent>,
        events_rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    ) -> (Uuid, Vec<ServerMessage>) {
        let replies = apply_client_message(start(), state, connection, events_tx).await;
        let session_id = match replies.as_slice() {
            [ServerMessage::Generating { session_id }] => *session_id,
            other => panic!("expected generating, got {:?}", other),
        };
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, ConnectionEvent::Generated { .. }));
        (session_id, apply_connection_event(event, connection, events_tx))
    }

    #[tokio::test]
    async fn timer_runs_only_while_the_session_is_active() {
        let state = app_state_with(Arc::new(Canned), true);
        let mut connection = ConnectionState::new(state.practice_service());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (session_id, replies) = started_session(&state, &mut connection, &tx, &mut rx).await;
        match replies.as_slice() {
            [ServerMessage::SessionStarted { passage }] => {
                assert_eq!(passage.session_id, session_id);
                assert_eq!(passage.questions.len(), 4);
            }
            other => panic!("expected session_started, got {:?}", other),
        }
        assert!(connection.timer_running());

        let stale = apply_connection_event(ConnectionEvent::Tick { session_id: Uuid::new_v4() }, &mut connection, &tx);
        assert!(stale.is_empty());

        let replies = apply_connection_event(ConnectionEvent::Tick { session_id }, &mut connection, &tx);
        match replies.as_slice() {
            [ServerMessage::TimerTick {
                elapsed_seconds,
                display,
                ..
            }] => {
                assert_eq!(*elapsed_seconds, 1);
                assert_eq!(display, "0:01");
            }
            other => panic!("expected timer_tick, got {:?}", other),
        }

        for question_id in 1..=4 {
            apply_client_message(
                ClientMessage::SelectAnswer {
                    question_id,
                    option_index: 0,
                },
                &state,
                &mut connection,
                &tx,
            )
            .await;
        }
        let replies = apply_client_message(ClientMessage::Submit, &state, &mut connection, &tx).await;
        match replies.as_slice() {
            [ServerMessage::SessionReviewed {
                score,
                elapsed_seconds,
                stats,
                ..
            }] => {
                assert_eq!(*score, 4);
                assert_eq!(*elapsed_seconds, 1);
                assert!(stats.is_none());
            }
            other => panic!("expected session_reviewed, got {:?}", other),
        }
        assert!(!connection.timer_running());

        let late = apply_connection_event(ConnectionEvent::Tick { session_id }, &mut connection, &tx);
        assert!(late.is_empty());
        assert_eq!(connection.practice.state().elapsed_seconds(), 1);

        let replies = apply_client_message(ClientMessage::Next, &state, &mut connection, &tx).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::SessionReset]));
        assert!(!connection.timer_running());
    }

    #[tokio::test]
    async fn incomplete_submission_keeps_the_timer_running() {
        let state = app_state_with(Arc::new(Canned), true);
        let mut connection = ConnectionState::new(state.practice_service());
        let (tx, mut rx) = mpsc::unbounded_channel();
        started_session(&state, &mut connection, &tx, &mut rx).await;

        apply_client_message(
            ClientMessage::SelectAnswer {
                question_id: 2,
                option_index: 1,
            },
            &state,
            &mut connection,
            &tx,
        )
        .await;
        let replies = apply_client_message(ClientMessage::Submit, &state, &mut connection, &tx).await;

        assert!(matches!(
            replies.as_slice(),
            [ServerMessage::SubmissionRejected {
                answered: 1,
                required: 4
            }]
        ));
        assert!(connection.timer_running());
    }

    #[tokio::test]
    async fn signed_in_submission_refreshes_the_leaderboard() {
        let state = app_state_with(Arc::new(Canned), true);
        let mut connection = ConnectionState::new(state.practice_service());
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .practice
            .sign_in(UserProfile {
                user_id: UserId::new("ana"),
                display_name: Some("Ana".to_string()),
                avatar_url: None,
            })
            .await;
        started_session(&state, &mut connection, &tx, &mut rx).await;

        for question_id in 1..=4 {
            apply_client_message(
                ClientMessage::SelectAnswer {
                    question_id,
                    option_index: if question_id == 1 { 0 } else { 3 },
                },
                &state,
                &mut connection,
                &tx,
            )
            .await;
        }
        let replies = apply_client_message(ClientMessage::Submit, &state, &mut connection, &tx).await;

        match replies.as_slice() {
            [ServerMessage::SessionReviewed { score, stats, .. }, ServerMessage::Leaderboard { entries }] => {
                assert_eq!(*score, 1);
                assert_eq!(stats.as_ref().map(|s| s.xp), Some(10));
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].user_id, "ana");
                assert_eq!(entries[0].xp, 10);
            }
            other => panic!("expected review and leaderboard, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_generation_returns_to_idle_without_a_timer() {
        let state = app_state(true);
        let mut connection = ConnectionState::new(state.practice_service());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (_, replies) = started_session(&state, &mut connection, &tx, &mut rx).await;

        assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));
        assert!(!connection.timer_running());
        assert_eq!(connection.practice.state().phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn second_start_while_generating_is_refused() {
        let state = app_state_with(Arc::new(Canned), true);
        let mut connection = ConnectionState::new(state.practice_service());
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = apply_client_message(start(), &state, &mut connection, &tx).await;
        assert!(matches!(first.as_slice(), [ServerMessage::Generating { .. }]));

        let second = apply_client_message(start(), &state, &mut connection, &tx).await;
        assert!(matches!(second.as_slice(), [ServerMessage::Error { .. }]));
        assert_eq!(connection.practice.state().phase(), SessionPhase::Generating);
        connection.shutdown();
    }
}
