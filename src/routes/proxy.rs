use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
};

use crate::gateway::{GatewayState, InboundRequest};
use crate::routes::{BodyResult, inbound_body};

const TENANT_API_PREFIX: &str = "/tenant-api/";

/// ANY /tenant-api/*endpoint
pub async fn tenant_api(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: BodyResult,
) -> Response {
    // Raw (still percent-encoded) remainder, so the upstream sees what the caller sent
    let forward_path = uri
        .path()
        .strip_prefix(TENANT_API_PREFIX)
        .unwrap_or_default()
        .to_string();

    let request = InboundRequest {
        method,
        forward_path,
        query: uri.query().map(String::from),
        headers,
        body: inbound_body(body),
        client_ip: connect_info.map(|ConnectInfo(addr)| addr.ip()),
    };

    state.pipeline.handle(&state.tenant_api, request).await
}

/// POST /graphql
pub async fn graphql(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    body: BodyResult,
) -> Response {
    let request = InboundRequest {
        method: Method::POST,
        forward_path: String::new(),
        query: uri.query().map(String::from),
        headers,
        body: inbound_body(body),
        client_ip: connect_info.map(|ConnectInfo(addr)| addr.ip()),
    };

    state.pipeline.handle(&state.graphql, request).await
}
