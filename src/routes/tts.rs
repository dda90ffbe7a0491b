// ============================================================================
// Text-to-Speech Route
// ============================================================================
//
// POST /tts {text, tenant_id}
//
// Stateless pass-through to the speech synthesis API. No bearer token,
// so the budget is per caller address; the body's tenant is only logged.
//
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::gateway::pipeline::translate;
use crate::gateway::router::TTS_TEMPLATE;
use crate::gateway::{GatewayState, RequestTimer};
use crate::rate_limit::{Admission, RateLimitKey, RouteId};
use crate::routes::{BodyResult, inbound_body};
use gateway_error::{AdmissionError, AppError, AppResult, ValidationError};

const LANGUAGE_CODE: &str = "zh-TW";
const VOICE_NAME: &str = "cmn-TW-Wavenet-A";
const AUDIO_ENCODING: &str = "MP3";

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub tenant_id: String,
}

/// Request document for the synthesis API
pub fn synthesis_payload(text: &str) -> serde_json::Value {
    json!({
        "input": { "text": text },
        "voice": { "languageCode": LANGUAGE_CODE, "name": VOICE_NAME },
        "audioConfig": { "audioEncoding": AUDIO_ENCODING },
    })
}

/// POST /tts
pub async fn text_to_speech(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: BodyResult,
) -> Response {
    let timer = RequestTimer::start(state.metrics().clone(), Method::POST, TTS_TEMPLATE);

    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let client = state.pipeline.client_address(&headers, peer);

    let response = match synthesize(&state, &client, inbound_body(body)).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    timer.finish(response.status());
    response
}

async fn synthesize(
    state: &GatewayState,
    client: &str,
    body: Result<Bytes, ValidationError>,
) -> AppResult<Response> {
    let route = &state.tts;
    let key = RateLimitKey::per_client(client, RouteId::new(Method::POST, TTS_TEMPLATE));
    if let Admission::Denied { retry_after } = state.limiter().admit(key, route.budget) {
        tracing::warn!(
            client = %client,
            route = TTS_TEMPLATE,
            retry_after_secs = retry_after.as_secs(),
            "Rate limit exceeded"
        );
        return Err(AdmissionError::RateLimited { retry_after }.into());
    }

    let request: TtsRequest = serde_json::from_slice(&body?)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    let Some(api_key) = route.api_key.as_deref() else {
        return Err(AppError::internal("TTS_API_KEY is not configured"));
    };

    tracing::debug!(
        tenant_id = %request.tenant_id,
        text_len = request.text.len(),
        "Synthesizing speech"
    );

    let outcome = state
        .pipeline
        .forwarder()
        .post_json(
            &route.url,
            &[("key", api_key)],
            &synthesis_payload(&request.text),
            route.timeout,
        )
        .await;

    translate(outcome)
}
