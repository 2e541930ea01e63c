mod config;
mod errors;
mod llm_client;
mod orchestrator;
mod personas;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LlmProvider};
use crate::llm_client::chat::ChatClient;
use crate::llm_client::inference::InferenceClient;
use crate::llm_client::transport::ReqwestTransport;
use crate::llm_client::ChatCompletion;
use crate::orchestrator::{default_panel, default_rotation, Orchestrator};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env().context("Failed to initialize LLM client configuration")?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview Panel API v{}", env!("CARGO_PKG_VERSION"));
    if config.partial_fallback {
        warn!("Partial LLM_FALLBACK_* configuration ignored; all three values are required");
    }

    // Initialize the shared LLM client
    let llm = build_llm_client(&config);
    info!(
        "LLM client initialized (provider: {}, model: {}, fallback: {})",
        config.provider.as_str(),
        config.llm_model,
        config.fallback.is_some()
    );

    // Initialize the persona panel
    let order = config.rotation_order.clone().unwrap_or_else(default_rotation);
    let orchestrator =
        Orchestrator::new(default_panel(llm), order).context("Failed to build persona panel")?;
    info!("Persona panel: {:?}", orchestrator.list_personas());

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        provider: config.provider.as_str(),
        model: config.llm_model.clone(),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the transport named by `LLM_PROVIDER`; every persona shares the result.
fn build_llm_client(config: &Config) -> Arc<dyn ChatCompletion> {
    let transport = Arc::new(ReqwestTransport::new());
    match config.provider {
        LlmProvider::Http => Arc::new(ChatClient::new(config.chat_settings(), transport)),
        LlmProvider::HfInference => {
            Arc::new(InferenceClient::new(config.inference_settings(), transport))
        }
    }
}
