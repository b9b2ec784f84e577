//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    middleware::Identity,
    protocol::{leaderboard_views, LeaderboardEntryView, StatsView},
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use rc_practice_core::{
    leaderboard::{self, LEADERBOARD_SIZE},
    ledger, UserStats,
};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        leaderboard_handler,
        stats_handler,
        health_handler,
    ),
    components(
        schemas(LeaderboardEntryView, StatsView)
    ),
    tags(
        (name = "RC Practice API", description = "Leaderboard and stats for the reading-comprehension trainer.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// The top users by XP.
#[utoipa::path(
    get,
    path = "/leaderboard",
    responses(
        (status = 200, description = "Up to five entries, highest XP first", body = [LeaderboardEntryView]),
        (status = 503, description = "The stats store could not be read")
    )
)]
pub async fn leaderboard_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardEntryView>>, (StatusCode, String)> {
    let records = app_state
        .stats
        .query_top_by_xp(LEADERBOARD_SIZE)
        .await
        .map_err(|e| {
            error!("Failed to load leaderboard: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to load leaderboard".to_string(),
            )
        })?;
    let entries = leaderboard::top_n(records, LEADERBOARD_SIZE);
    Ok(Json(leaderboard_views(entries)))
}

/// The signed-in user's stats, with the streak as it stands today.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "The caller's stats", body = StatsView),
        (status = 401, description = "No identity was supplied"),
        (status = 503, description = "The stats store could not be read")
    ),
    params(
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<StatsView>, (StatusCode, String)> {
    let Identity(Some(profile)) = identity else {
        return Err((StatusCode::UNAUTHORIZED, "Sign in to see your stats".to_string()));
    };

    let stats = app_state
        .stats
        .read_stats(&profile.user_id)
        .await
        .map_err(|e| {
            error!("Failed to read stats for {}: {:?}", profile.user_id, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to load stats".to_string(),
            )
        })?
        .unwrap_or_default();

    let today = app_state.calendar.today(&app_state.clock);
    Ok(Json(StatsView::from(UserStats {
        streak: ledger::effective_streak(&stats, today),
        ..stats
    })))
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The server is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
