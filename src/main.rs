//! karbo-chat - chat service in front of the Gemini API
//!
//! Keeps each browser session's conversation server-side, replays it to
//! the model on every turn, and streams changes back over SSE. The API key
//! never leaves this process.

mod api;
mod chat;
mod config;
mod conversation;
mod llm;
mod sessions;
mod system_prompt;

use api::{create_router, AppState};
use chat::ResponseRequester;
use config::ChatConfig;
use sessions::SessionManager;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "karbo_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ChatConfig::from_env()?;
    if config.api_key.is_none() && config.gateway.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; every reply will be the placeholder");
    }

    let instruction = system_prompt::load_instruction(config.system_prompt_path.as_deref())?;

    let service = llm::build_service(&config)?;
    let requester = ResponseRequester::new(service, config.web_search)
        .with_max_output_tokens(config.max_output_tokens);
    tracing::info!(
        model = %requester.model_id(),
        web_search = config.web_search,
        timeout_secs = config.request_timeout.as_secs(),
        max_output_tokens = ?config.max_output_tokens,
        "LLM client initialized"
    );

    let sessions =
        SessionManager::new(instruction, requester).with_max_sessions(config.max_sessions);
    let state = AppState::new(sessions);
    let _sweeper = state
        .sessions
        .spawn_idle_sweeper(config.session_idle_timeout);
    tracing::info!(
        idle_secs = config.session_idle_timeout.as_secs(),
        max_sessions = config.max_sessions,
        "Session limits applied"
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("karbo-chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
