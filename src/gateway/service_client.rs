// ============================================================================
// Service Client
// ============================================================================
//
// HTTP client for the tenant backend and the other upstreams.
// Handles:
// - Outbound URL and header construction
// - Exactly one attempt per request, bounded by the route timeout
// - Mapping transport failures to gateway error kinds
//
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;

use crate::auth::Principal;
use gateway_error::GatewayError;

/// Inbound headers never copied to the upstream request
const EXCLUDED_HEADERS: [&str; 7] = [
    "host",
    "content-length",
    "accept-encoding",
    "user-agent",
    "connection",
    "authorization",
    "transfer-encoding",
];

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Where a route sends its traffic
#[derive(Debug, Clone)]
pub enum UpstreamTarget {
    /// `{base_url}/{segment}/{forwarded path}`
    TenantBackend { base_url: String, segment: String },
    /// A single endpoint; the forwarded path is not appended
    Fixed { url: String },
}

impl UpstreamTarget {
    pub fn url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = match self {
            UpstreamTarget::TenantBackend { base_url, segment } => format!(
                "{}/{}/{}",
                base_url.trim_end_matches('/'),
                segment.trim_matches('/'),
                path.trim_start_matches('/')
            ),
            UpstreamTarget::Fixed { url } => url.clone(),
        };
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Outbound request, fixed once the caller's principal is known.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    tenant_id: String,
    original_authorization: Option<HeaderValue>,
}

impl ProxyRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
        principal: &Principal,
    ) -> Self {
        let original_authorization = headers.get(header::AUTHORIZATION).cloned();
        Self {
            method,
            path: path.into(),
            query,
            headers,
            body,
            tenant_id: principal.tenant_id().to_string(),
            original_authorization,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Headers as sent upstream
    pub fn outbound_headers(&self) -> HeaderMap {
        let mut outbound = HeaderMap::with_capacity(self.headers.len() + 3);
        for (name, value) in self.headers.iter() {
            if !EXCLUDED_HEADERS.contains(&name.as_str()) {
                outbound.append(name.clone(), value.clone());
            }
        }

        if let Ok(tenant) = HeaderValue::from_str(&self.tenant_id) {
            outbound.insert(HeaderName::from_static(TENANT_HEADER), tenant);
        }
        if let Some(auth) = &self.original_authorization {
            outbound.insert(header::AUTHORIZATION, auth.clone());
        }
        if !outbound.contains_key(header::ACCEPT) {
            outbound.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        }
        outbound
    }
}

#[derive(Debug, Clone)]
pub enum ProxyOutcome {
    Success {
        status: StatusCode,
        body: Bytes,
        content_type: Option<HeaderValue>,
    },
    /// Upstream answered with status >= 400
    UpstreamError { status: StatusCode, message: String },
    GatewayError(GatewayError),
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward a tenant request to `target`.
    async fn forward(
        &self,
        request: &ProxyRequest,
        target: &UpstreamTarget,
        timeout: Duration,
    ) -> ProxyOutcome;

    /// POST a JSON document to a fixed URL, no tenant context.
    /// `query` pairs are appended to the URL and never logged.
    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> ProxyOutcome;
}

/// reqwest-backed forwarder
pub struct ServiceClient {
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new() -> Result<Self> {
        // Configure connection pooling and keep-alive
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn execute(&self, builder: reqwest::RequestBuilder, url: &str) -> ProxyOutcome {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let e = e.without_url();
                tracing::error!(error = %e, url = %url, "Upstream request failed");
                return ProxyOutcome::GatewayError(map_send_error(&e));
            }
        };

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let e = e.without_url();
                tracing::error!(error = %e, url = %url, "Failed to read upstream response");
                let err = if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Internal(format!("unreadable upstream body: {}", e))
                };
                return ProxyOutcome::GatewayError(err);
            }
        };

        if status.is_client_error() || status.is_server_error() {
            return ProxyOutcome::UpstreamError {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            };
        }

        ProxyOutcome::Success {
            status,
            body,
            content_type,
        }
    }
}

#[async_trait]
impl Forwarder for ServiceClient {
    async fn forward(
        &self,
        request: &ProxyRequest,
        target: &UpstreamTarget,
        timeout: Duration,
    ) -> ProxyOutcome {
        let url = target.url(request.path(), request.query());

        tracing::debug!(
            method = %request.method(),
            url = %url,
            tenant_id = %request.tenant_id(),
            "Forwarding request"
        );

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.outbound_headers())
            .timeout(timeout);
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        self.execute(builder, &url).await
    }

    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> ProxyOutcome {
        let builder = self
            .client
            .post(url)
            .query(query)
            .json(payload)
            .timeout(timeout);
        self.execute(builder, url).await
    }
}

fn map_send_error(e: &reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        GatewayError::Unreachable(e.to_string())
    } else {
        GatewayError::Internal(e.to_string())
    }
}
