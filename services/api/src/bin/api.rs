//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{BackendGeneratorAdapter, DbAdapter, InMemoryStatsStore, OpenAiGeneratorAdapter},
    config::{Config, GeneratorStrategy},
    error::ApiError,
    web::{
        health_handler, identify, leaderboard_handler, rest::ApiDoc, state::AppState, stats_handler,
        ws_handler,
    },
};
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use axum::{middleware as axum_middleware, routing::get, Router};
use rc_practice_core::{
    ports::{ContentGenerator, StatsStore},
    Clock, FallbackGenerator, PracticeCalendar,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Stats Store ---
    let stats: Arc<dyn StatsStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; stats will be kept in memory and lost on restart.");
            Arc::new(InMemoryStatsStore::new())
        }
    };

    // --- 3. Initialize the Content Generators ---
    let generator = build_generator(&config)?;
    info!("Content generation strategy: {}", generator.name());

    let calendar = PracticeCalendar::from_offset_minutes(config.practice_utc_offset_minutes)
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "Invalid practice UTC offset: {} minutes",
                config.practice_utc_offset_minutes
            ))
        })?;

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        stats,
        generator,
        config: config.clone(),
        clock: Clock::System,
        calendar,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-name"),
            HeaderName::from_static("x-user-avatar"),
        ]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/stats", get(stats_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn(identify))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wires up the generator strategies named by the configuration.
fn build_generator(config: &Config) -> Result<Arc<dyn ContentGenerator>, ApiError> {
    let backend = match &config.generator_backend_url {
        Some(url) => Some(Arc::new(BackendGeneratorAdapter::new(url.clone())?) as Arc<dyn ContentGenerator>),
        None => None,
    };
    let direct = config.generator_api_key.as_deref().map(|key| {
        Arc::new(OpenAiGeneratorAdapter::from_key(
            key,
            config.generator_api_base.as_deref(),
            config.generation_model.clone(),
        )) as Arc<dyn ContentGenerator>
    });

    let missing = |var: &str| ApiError::Internal(format!("{} is required for this generator strategy", var));
    match config.generator_strategy {
        GeneratorStrategy::Backend => backend.ok_or_else(|| missing("GENERATOR_BACKEND_URL")),
        GeneratorStrategy::Direct => direct.ok_or_else(|| missing("GENERATOR_API_KEY")),
        GeneratorStrategy::Fallback => {
            let strategies: Vec<Arc<dyn ContentGenerator>> = backend.into_iter().chain(direct).collect();
            if strategies.is_empty() {
                return Err(missing("GENERATOR_BACKEND_URL or GENERATOR_API_KEY"));
            }
            Ok(Arc::new(FallbackGenerator::new(strategies)))
        }
    }
}
