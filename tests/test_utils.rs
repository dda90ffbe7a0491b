#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
};
use bytes::Bytes;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use tenant_gateway::Config;
use tenant_gateway::gateway::GatewayState;
use tokio::net::TcpListener;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const TTS_KEY: &str = "tts-test-key";

/// A request as seen by the stub upstream
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct StubUpstream {
    pub address: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubUpstream {
    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("upstream received no request")
    }

    fn record(&self, method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(String::from),
            headers,
            body,
        });
    }
}

async fn tenant_routes(
    State(stub): State<StubUpstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.record(method.clone(), &uri, headers, body.clone());
    let path = uri.path().trim_start_matches("/tenant-routes/").to_string();

    if path.starts_with("fail") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "backend exploded: SQLSTATE[42S02]",
        )
            .into_response();
    }
    if path.starts_with("missing") {
        return (StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#).into_response();
    }
    if path.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    if path.starts_with("empty") {
        return StatusCode::NO_CONTENT.into_response();
    }

    match method {
        Method::POST => {
            let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
            (
                StatusCode::CREATED,
                Json(json!({"id": 1, "path": path, "received": payload})),
            )
                .into_response()
        }
        _ => Json(json!({"path": path, "method": method.as_str()})).into_response(),
    }
}

async fn graphql(
    State(stub): State<StubUpstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.record(method, &uri, headers, body);
    Json(json!({"data": {"articles": [{"id": 1, "title": "hello"}]}})).into_response()
}

#[derive(serde::Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

async fn synthesize(
    State(stub): State<StubUpstream>,
    Query(query): Query<KeyQuery>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.record(method, &uri, headers, body);
    if query.key.as_deref() != Some(TTS_KEY) {
        return (StatusCode::FORBIDDEN, "API key not valid").into_response();
    }
    Json(json!({"audioContent": "SUQzBAAAAAAA"})).into_response()
}

pub async fn spawn_upstream() -> StubUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let stub = StubUpstream {
        address,
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/tenant-routes/*path", any(tenant_routes))
        .route("/graphql", post(graphql))
        .route("/v1/synthesize", post(synthesize))
        .with_state(stub.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    stub
}

pub struct TestApp {
    pub address: String,
    pub upstream: StubUpstream,
    pub state: Arc<GatewayState>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Request carrying a valid token and matching X-Tenant-ID
    pub fn authed(&self, method: reqwest::Method, path: &str, tenant: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(token("7", tenant))
            .header("X-Tenant-ID", tenant)
    }

    pub async fn metrics_text(&self) -> String {
        self.client
            .get(self.url("/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }
}

pub fn test_config(upstream: &StubUpstream) -> Config {
    let mut config = Config::new(JWT_SECRET);
    config.version = "test".to_string();
    config.upstream.backend_base_url = upstream.address.clone();
    config.upstream.graphql_url = format!("{}/graphql", upstream.address);
    config.upstream.tts_url = format!("{}/v1/synthesize", upstream.address);
    config.upstream.tts_api_key = Some(TTS_KEY.to_string());
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a stub upstream and a gateway pointed at it; `customize` may
/// adjust the configuration before the gateway starts.
pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let upstream = spawn_upstream().await;

    let mut config = test_config(&upstream);
    customize(&mut config);

    let state = GatewayState::new(Arc::new(config)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(tenant_gateway::serve(
        listener,
        state.clone(),
        std::future::pending(),
    ));

    TestApp {
        address: format!("http://{}", addr),
        upstream,
        state,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
    }
}

pub fn token(sub: &str, tenant: &str) -> String {
    sign(json!({"sub": sub, "tenant_id": tenant}), JWT_SECRET)
}

pub fn sign(claims: serde_json::Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
