mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::notifications::LogNotifier;
use crate::pipeline::runner::Pipeline;
use crate::pipeline::store::SessionStore;
use crate::routes::build_router;
use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Filter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_max_retries)?;
    info!(
        "LLM client initialized (model: {}, retries: {})",
        llm_client::MODEL,
        config.llm_max_retries
    );

    // Mock emails go to the log
    let pipeline = Pipeline::new(Arc::new(llm), Arc::new(LogNotifier))
        .with_follow_up_threshold(config.follow_up_threshold);
    info!("Follow-up threshold: {}", config.follow_up_threshold);

    let sessions = SessionStore::new();
    let idle_timeout = Duration::from_secs(config.session_idle_timeout_secs);
    tokio::spawn(sessions.clone().sweep(idle_timeout, SWEEP_INTERVAL));
    info!("Idle sessions expire after {}s", config.session_idle_timeout_secs);

    let state = AppState {
        sessions,
        pipeline,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
