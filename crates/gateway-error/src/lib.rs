use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

// ============================================================================
// Pipeline error kinds
// ============================================================================

/// Bearer credential failures. Always terminal for the request (401).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or non-bearer Authorization header")]
    MissingBearer,

    #[error("token could not be parsed")]
    Malformed,

    #[error("token signature verification failed")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is missing the subject or tenant claim")]
    MissingClaims,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("rate limit exceeded, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing X-Tenant-ID header")]
    MissingTenantHeader,

    #[error("X-Tenant-ID header does not match the token tenant")]
    TenantMismatch,

    #[error("invalid request body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

/// Failures on the gateway side of the upstream call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream timed out: {0}")]
    Timeout(String),

    #[error("internal gateway error: {0}")]
    Internal(String),
}

// ============================================================================
// AppError
// ============================================================================

/// Application error type translated into an HTTP response at the
/// pipeline boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Upstream answered with status >= 400; status is preserved.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Admission(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(ValidationError::PayloadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { status, .. } => *status,
            AppError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(AuthError::MissingBearer) => "Missing bearer token".to_string(),
            AppError::Auth(AuthError::MissingClaims) => {
                "Invalid authentication token: missing tenant or user id".to_string()
            }
            AppError::Auth(AuthError::Expired) => "Authentication token has expired".to_string(),
            AppError::Auth(_) => "Invalid authentication token".to_string(),
            AppError::Admission(_) => "Too many requests".to_string(),
            AppError::Validation(ValidationError::MissingTenantHeader) => {
                "Missing X-Tenant-ID header".to_string()
            }
            AppError::Validation(ValidationError::TenantMismatch) => {
                "X-Tenant-ID does not match the authenticated tenant".to_string()
            }
            AppError::Validation(ValidationError::MalformedBody(_)) => {
                "Invalid JSON request body".to_string()
            }
            AppError::Validation(ValidationError::PayloadTooLarge { limit }) => {
                format!("Request body exceeds {} bytes", limit)
            }
            AppError::Upstream { .. } => "Upstream error".to_string(),
            AppError::Gateway(_) => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(AuthError::MissingBearer) => "MISSING_TOKEN",
            AppError::Auth(AuthError::Malformed) => "MALFORMED_TOKEN",
            AppError::Auth(AuthError::SignatureInvalid) => "INVALID_SIGNATURE",
            AppError::Auth(AuthError::Expired) => "TOKEN_EXPIRED",
            AppError::Auth(AuthError::MissingClaims) => "MISSING_CLAIMS",
            AppError::Admission(_) => "RATE_LIMITED",
            AppError::Validation(ValidationError::MissingTenantHeader) => "MISSING_TENANT",
            AppError::Validation(ValidationError::TenantMismatch) => "TENANT_MISMATCH",
            AppError::Validation(ValidationError::MalformedBody(_)) => "MALFORMED_BODY",
            AppError::Validation(ValidationError::PayloadTooLarge { .. }) => "PAYLOAD_TOO_LARGE",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Gateway(GatewayError::Unreachable(_)) => "UPSTREAM_UNREACHABLE",
            AppError::Gateway(GatewayError::Timeout(_)) => "UPSTREAM_TIMEOUT",
            AppError::Gateway(GatewayError::Internal(_)) => "INTERNAL_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        match self {
            AppError::Upstream { .. } => {
                tracing::warn!(
                    error = %self,
                    error_code = %code,
                    status = %status.as_u16(),
                    "Upstream returned an error"
                );
            }
            _ if status.is_server_error() => {
                tracing::error!(
                    error = %self,
                    error_code = %code,
                    status = %status.as_u16(),
                    "Server error occurred"
                );
            }
            AppError::Auth(_) => {
                tracing::warn!(error = %self, error_code = %code, "Authentication failed");
            }
            _ => {
                tracing::debug!(error = %self, error_code = %code, "Client error occurred");
            }
        }
    }

    fn body(&self) -> serde_json::Value {
        let status = self.status_code();
        match self {
            // Upstream text is surfaced verbatim
            AppError::Upstream { body, .. } => json!({
                "error": self.user_message(),
                "error_code": self.error_code(),
                "status": status.as_u16(),
                "detail": format!("Backend error: {}", body),
            }),
            _ => json!({
                "error": self.user_message(),
                "error_code": self.error_code(),
                "status": status.as_u16(),
            }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let mut response = (status, axum::Json(self.body())).into_response();

        match &self {
            AppError::Auth(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            AppError::Admission(AdmissionError::RateLimited { retry_after }) => {
                // Whole seconds, rounded up
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
            }
            _ => {}
        }

        response
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    /// Create an upstream error preserving the upstream status
    pub fn upstream(status: StatusCode, body: impl Into<String>) -> Self {
        AppError::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create an internal server error
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Gateway(GatewayError::Internal(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(AuthError::SignatureInvalid).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(ValidationError::TenantMismatch).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AdmissionError::RateLimited {
                retry_after: Duration::from_secs(3)
            })
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(ValidationError::PayloadTooLarge { limit: 16 }).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::upstream(StatusCode::NOT_FOUND, "nope").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(GatewayError::Timeout("30s".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_upstream_error_body_carries_upstream_text() {
        let (status, _, body) =
            body_json(AppError::upstream(StatusCode::BAD_GATEWAY, "backend exploded")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error_code"], "UPSTREAM_ERROR");
        assert_eq!(body["status"], 502);
        assert!(body["detail"].as_str().unwrap().contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_gateway_error_hides_details() {
        let (status, _, body) = body_json(AppError::from(GatewayError::Unreachable(
            "dns error: no such host laravel".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["error_code"], "UPSTREAM_UNREACHABLE");
        assert!(!body.to_string().contains("laravel"));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let (status, headers, _) = body_json(AppError::from(AdmissionError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }))
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "2");
    }

    #[tokio::test]
    async fn test_auth_error_sets_www_authenticate() {
        let (_, headers, body) = body_json(AppError::from(AuthError::MissingClaims)).await;
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(body["error_code"], "MISSING_CLAIMS");
    }
}
