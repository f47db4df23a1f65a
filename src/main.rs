//! Voice Bridge - subscriber call bridging and voicemail
//!
//! Receives call-control webhooks, bridges callers to subscribers' SIP
//! devices, captures voicemail when nobody answers and pushes new messages
//! to connected subscribers.

mod models;
mod server;

use server::config::AppConfig;

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("voice_bridge=info".parse()?))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    tracing::info!("Starting Voice Bridge server on port {}", config.port);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server::run_server(config))
}
