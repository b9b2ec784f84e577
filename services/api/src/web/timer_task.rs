//! services/api/src/web/timer_task.rs
//!
//! The per-session stopwatch. It emits one tick per second for a single session
//! until its `CancellationToken` is cancelled or the connection goes away.

use crate::web::state::ConnectionEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Sends `ConnectionEvent::Tick` for `session_id` once per second.
///
/// Ticks carry the session id, so a tick that arrives after the session ended is
/// recognised as stale and ignored by the session machine.
pub async fn timer_process(
    session_id: Uuid,
    events: UnboundedSender<ConnectionEvent>,
    cancellation_token: CancellationToken,
) {
    debug!("Timer started for session {}.", session_id);
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    // The first tick of a tokio interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Timer for session {} cancelled.", session_id);
                return;
            }
            _ = interval.tick() => {
                if events.send(ConnectionEvent::Tick { session_id }).is_err() {
                    debug!("Connection closed; stopping timer for session {}.", session_id);
                    return;
                }
            }
        }
    }
}
