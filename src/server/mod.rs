//! Server-side code for Voice Bridge
//!
//! This module contains all backend functionality:
//! - Database access (PostgreSQL via sqlx)
//! - Catapult call-control integration
//! - Call-event flows (bridging, voicemail, greeting IVR)
//! - Live voicemail notifications
//! - Authentication (JWT)
//! - API routes

pub mod db;
pub mod catapult;
pub mod auth;
pub mod config;
pub mod flows;
pub mod notifications;
pub mod voice_messages;
pub mod webhooks;


use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use axum::http::Method;
use tower_http::trace::TraceLayer;

use config::AppConfig;
use flows::CallOrchestrator;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: CallOrchestrator,
    pub jwt_secret: String,
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Call-control webhooks
        .route("/api/webhooks/calls", get(webhooks::handle_call_event).post(webhooks::handle_call_event))

        // Greeting management and WebRTC phone registration
        .route("/api/greeting/record", post(voice_messages::record_greeting))
        .route("/api/sip-data", get(voice_messages::sip_data))

        // Voice messages
        .route("/api/voice-messages", get(voice_messages::list_messages))
        .route("/api/voice-messages/stream", get(voice_messages::stream_messages))
        .route("/api/voice-messages/{id}", delete(voice_messages::delete_message))
        .route("/api/voice-messages/{id}/media", get(voice_messages::download_message))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Initialize and start the server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;
    if config.uses_default_jwt_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // Initialize database
    let pool = db::init_pool(&config.database_url).await?;

    // Run migrations (non-fatal if already applied)
    if let Err(e) = db::run_migrations(&pool).await {
        tracing::warn!("Migration warning (may be already applied): {}", e);
    }

    let catapult = catapult::CatapultClient::new(
        &config.catapult_api_url,
        &config.catapult_user_id,
        config.catapult_api_token.clone(),
        config.catapult_api_secret.clone(),
    )
    .with_domain(&config.catapult_domain_id);

    let orchestrator = CallOrchestrator::new(
        Arc::new(catapult),
        Arc::new(db::PgStore::new(pool)),
        notifications::NotificationBus::new(),
        config.flow_config(),
    );

    let state = AppState {
        orchestrator,
        jwt_secret: config.jwt_secret.clone(),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", config.port);
    tracing::info!("Call webhooks expected at {}", config.webhook_url);

    axum::serve(listener, app).await?;

    Ok(())
}
