pub mod auth;
pub mod gateway;
pub mod rate_limit;
pub mod routes;
pub mod telemetry;
pub mod utils;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use gateway::GatewayState;

pub use gateway_config::Config;

/// Serve the gateway on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = routes::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Failed to start server")?;

    Ok(())
}

/// Periodically drop expired rate-limit windows.
pub fn spawn_limiter_sweeper(state: Arc<GatewayState>) -> tokio::task::JoinHandle<()> {
    let period = std::time::Duration::from_secs(state.config.rate_limits.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = state.limiter().purge_expired();
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = state.limiter().len(),
                    "Purged expired rate-limit windows"
                );
            }
        }
    })
}
