//! Main Entrypoint for the Live Sales Coach API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the prompt library and building the agent catalog.
//! 3. Initializing the coaching tools and the Gemini Live runtime.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use coach_api::{config::Config, router::create_router, state::AppState};
use coach_core::{
    agents::AgentCatalog,
    prompts::PromptLibrary,
    tools::{CoachingToolboxProvider, CrmWebhook},
};
use gemini_live::GeminiLiveRuntime;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts and Agents ---
    let prompts = PromptLibrary::load(&config.prompts_path).with_context(|| {
        format!("Failed to load prompts from {}", config.prompts_path.display())
    })?;
    info!(count = prompts.len(), "Prompt library loaded.");
    let agents = AgentCatalog::new(prompts).context("coach_system.md is required")?;

    // --- 4. Initialize the Agent Runtime ---
    let crm = config.crm_webhook_url.clone().map(CrmWebhook::new);
    if crm.is_none() {
        info!("CRM_WEBHOOK_URL not set; call summaries stay local.");
    }
    let tools = Arc::new(CoachingToolboxProvider::new(crm));
    let mut runtime =
        GeminiLiveRuntime::new(config.gemini_api_key.clone(), config.live_model.clone(), tools);
    if let Some(endpoint) = &config.live_endpoint {
        runtime = runtime.with_endpoint(endpoint.clone());
    }
    info!(model = runtime.model(), "Gemini Live runtime ready.");

    let bind_address = config.bind_address;
    let app_state = Arc::new(AppState::new(config, agents, Arc::new(runtime)));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(bind_address = %bind_address, "Service configured. Starting server...");
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
