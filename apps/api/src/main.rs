mod config;
mod errors;
mod export;
mod extraction;
mod llm_client;
mod resumes;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::DocumentExtractor;
use crate::llm_client::LlmClient;
use crate::resumes::pipeline::{ResumeParser, RetryPolicy};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing API key or a bad value)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume parser v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(&config);
    info!(
        "LLM client initialized (model: {}, streaming: {})",
        llm.model(),
        config.llm_streaming
    );

    // Wire the pipeline: client and extractor are injected, never global.
    let extractor = DocumentExtractor::new(config.upload_spool_dir.clone());
    let policy = RetryPolicy::from_config(&config);
    let parser = ResumeParser::new(
        Arc::new(llm),
        Arc::new(extractor),
        policy,
        config.llm_streaming,
    );
    info!(
        "Parse retry policy: {} retries, {}ms apart",
        parser.policy().max_retries,
        parser.policy().delay.as_millis()
    );

    // Build app state
    let state = AppState {
        parser,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the upload UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
