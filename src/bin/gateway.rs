// ============================================================================
// Tenant Gateway Service
// ============================================================================
//
// Entry point for all tenant traffic. Verifies bearer tokens, enforces
// per-route budgets, forwards to the tenant backend and exposes metrics.
//
// ============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tenant_gateway::Config;
use tenant_gateway::gateway::GatewayState;
use tenant_gateway::telemetry;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);

    // Error tracking; the guard flushes pending events on drop
    let sentry_guard = telemetry::sentry_options(&config)?.map(sentry::init);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    info!("=== Tenant Gateway Starting ===");
    info!("Version: {}", config.version);
    if sentry_guard.is_some() {
        info!("Sentry enabled (environment: {})", config.app_env);
    } else {
        info!("SENTRY_DSN not set; error tracking disabled");
    }
    info!("Backend: {}", config.upstream.backend_base_url);
    if config.upstream.tts_api_key.is_none() {
        tracing::warn!("TTS_API_KEY is not set; /tts requests will fail with 500");
    }

    let state = GatewayState::new(config.clone())?;
    let sweeper = tenant_gateway::spawn_limiter_sweeper(state.clone());

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Tenant gateway listening on {}", addr);

    tenant_gateway::serve(listener, state, shutdown_signal()).await?;

    sweeper.abort();
    info!("Tenant gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
