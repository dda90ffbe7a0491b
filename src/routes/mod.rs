// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Router assembly and middleware
// - health.rs: Health check and metrics endpoints
// - proxy.rs: Tenant API and GraphQL forwarding
// - tts.rs: Text-to-speech pass-through
// - webhook.rs: Tenant initialization webhook
//
// ============================================================================

mod health;
mod proxy;
mod tts;
mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, rejection::BytesRejection},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
};
use bytes::Bytes;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::GatewayState;
use gateway_config::MAX_REQUEST_BODY_SIZE;
use gateway_error::ValidationError;

/// Body extractor that lets the handler report read failures itself
type BodyResult = Result<Bytes, BytesRejection>;

/// Body read failures become pipeline errors so they are recorded like any
/// other exit.
fn inbound_body(body: BodyResult) -> Result<Bytes, ValidationError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationError::PayloadTooLarge {
                limit: MAX_REQUEST_BODY_SIZE,
            }
        } else {
            ValidationError::MalformedBody(rejection.body_text())
        }
    })
}

/// Create the main application router with all routes
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        // Health and monitoring
        .route("/", get(health::health_check))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Tenant forwarding
        .route(
            "/tenant-api/*endpoint",
            get(proxy::tenant_api)
                .post(proxy::tenant_api)
                .put(proxy::tenant_api)
                .delete(proxy::tenant_api)
                .patch(proxy::tenant_api),
        )
        .route("/graphql", post(proxy::graphql))
        // External services
        .route("/tts", post(tts::text_to_speech))
        .route("/webhook/tenant-init", post(webhook::tenant_init))
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
                .into_inner(),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials cannot be combined with wildcards; mirror instead
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
