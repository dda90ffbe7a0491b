// ============================================================================
// Gateway Pipeline
// ============================================================================
//
// Per inbound request, strictly in order:
//   authenticate -> admit -> check tenant + body -> forward -> translate
// and record count + duration on every exit path (see RequestTimer).
//
// ============================================================================

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::auth::{Principal, TokenValidator, extract_bearer};
use crate::gateway::service_client::{
    Forwarder, ProxyOutcome, ProxyRequest, TENANT_HEADER, UpstreamTarget,
};
use crate::gateway::timing::RequestTimer;
use crate::rate_limit::{Admission, RateLimitKey, RateLimiter, RouteId};
use crate::utils::extract_client_ip;
use gateway_config::RateBudget;
use gateway_error::{AdmissionError, AppError, AppResult, ValidationError};
use gateway_metrics::MetricsRegistry;

/// How a route treats the inbound body before forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// POST/PUT/PATCH bodies must be JSON and are forwarded unmodified
    Json,
    /// Body must be a [`GraphQlRequest`]; only its fields are forwarded
    GraphQl,
}

/// Accepted shape of a GraphQL request document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

/// Static description of one forwarding route
#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Route template, used for rate-limit keys and as the metrics `path`
    /// label (e.g. `/tenant-api/*endpoint`)
    pub template: &'static str,
    pub budget: RateBudget,
    pub timeout: Duration,
    pub target: UpstreamTarget,
    pub body: BodyPolicy,
}

/// Everything the pipeline needs from the inbound HTTP request
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    /// Path handed to the upstream target (the captured endpoint)
    pub forward_path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// `Err` when the body could not be read (e.g. over the size limit)
    pub body: Result<Bytes, ValidationError>,
    pub client_ip: Option<IpAddr>,
}

pub struct GatewayPipeline {
    validator: TokenValidator,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsRegistry>,
    forwarder: Arc<dyn Forwarder>,
    trust_forwarded_headers: bool,
}

impl GatewayPipeline {
    pub fn new(
        validator: TokenValidator,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsRegistry>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            validator,
            limiter,
            metrics,
            forwarder,
            trust_forwarded_headers: false,
        }
    }

    /// Key clients by X-Forwarded-For / X-Real-IP instead of the peer address.
    pub fn with_trusted_forwarding(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn forwarder(&self) -> &Arc<dyn Forwarder> {
        &self.forwarder
    }

    /// Caller address used as the client part of rate-limit keys
    pub fn client_address(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> String {
        extract_client_ip(headers, peer, self.trust_forwarded_headers)
    }

    /// Run one request through the pipeline and produce the HTTP response.
    pub async fn handle(&self, route: &RouteSpec, request: InboundRequest) -> Response {
        let timer = RequestTimer::start(
            self.metrics.clone(),
            request.method.clone(),
            route.template,
        );

        let response = match self.run(route, request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };

        timer.finish(response.status());
        response
    }

    async fn run(&self, route: &RouteSpec, request: InboundRequest) -> AppResult<Response> {
        // 1. Authenticate
        let token = extract_bearer(&request.headers)?;
        let principal = self.validator.validate(token)?;

        // 2. Admit
        let client = self.client_address(&request.headers, request.client_ip);
        let key = RateLimitKey::new(
            client.clone(),
            principal.tenant_id(),
            RouteId::new(request.method.clone(), route.template),
        );
        if let Admission::Denied { retry_after } = self.limiter.admit(key, route.budget) {
            tracing::warn!(
                client = %client,
                tenant_id = %principal.tenant_id(),
                route = %route.template,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            return Err(AdmissionError::RateLimited { retry_after }.into());
        }

        // 3. Build & forward
        check_tenant_header(&request.headers, &principal)?;
        let body = check_body(&request.method, request.body?, route.body)?;

        let mut headers = request.headers;
        if route.body == BodyPolicy::GraphQl {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        let proxy = ProxyRequest::new(
            request.method,
            request.forward_path,
            request.query,
            headers,
            body,
            &principal,
        );
        let outcome = self
            .forwarder
            .forward(&proxy, &route.target, route.timeout)
            .await;

        // 4. Translate
        translate(outcome)
    }
}

fn check_tenant_header(headers: &HeaderMap, principal: &Principal) -> Result<(), ValidationError> {
    let header_tenant = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingTenantHeader)?;

    if header_tenant != principal.tenant_id() {
        tracing::warn!(
            token_tenant = %principal.tenant_id(),
            header_tenant = %header_tenant,
            user_id = %principal.user_id(),
            "Tenant mismatch"
        );
        return Err(ValidationError::TenantMismatch);
    }
    Ok(())
}

fn malformed(e: serde_json::Error) -> ValidationError {
    ValidationError::MalformedBody(e.to_string())
}

/// Bodies of POST/PUT/PATCH must be JSON; other methods pass through as-is.
/// GraphQL bodies are re-encoded from the accepted fields only.
fn check_body(
    method: &Method,
    body: Bytes,
    policy: BodyPolicy,
) -> Result<Option<Bytes>, ValidationError> {
    if policy == BodyPolicy::GraphQl {
        let request: GraphQlRequest = serde_json::from_slice(&body).map_err(malformed)?;
        let encoded = serde_json::to_vec(&request).map_err(malformed)?;
        return Ok(Some(Bytes::from(encoded)));
    }

    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        serde_json::from_slice::<serde::de::IgnoredAny>(&body).map_err(malformed)?;
        return Ok(Some(body));
    }

    Ok(if body.is_empty() { None } else { Some(body) })
}

/// Map a forwarding outcome onto the response the caller sees.
pub fn translate(outcome: ProxyOutcome) -> AppResult<Response> {
    match outcome {
        ProxyOutcome::Success {
            status,
            body,
            content_type,
        } => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            if let Some(content_type) = content_type {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, content_type);
            }
            Ok(response)
        }
        ProxyOutcome::UpstreamError { status, message } => {
            Err(AppError::upstream(status, message))
        }
        ProxyOutcome::GatewayError(e) => Err(e.into()),
    }
}
