// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /, GET /health - Static liveness payload
// - GET /metrics - Prometheus text exposition
//
// ============================================================================

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::gateway::GatewayState;
use gateway_error::AppError;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Tenant gateway is running",
    }))
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<GatewayState>>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics().render().map_err(|e| {
        tracing::error!(error = %e, "Failed to render metrics");
        AppError::internal(e.to_string())
    })?;

    Ok((
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        body,
    ))
}
