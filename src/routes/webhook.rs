use axum::{Json, response::IntoResponse};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use gateway_error::{AppError, ValidationError};

/// Sent by the backend after it provisions a tenant
#[derive(Debug, Deserialize)]
pub struct TenantInitPayload {
    pub tenant_id: String,
    pub tenant_name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// POST /webhook/tenant-init
pub async fn tenant_init(body: Bytes) -> Result<impl IntoResponse, AppError> {
    let payload: TenantInitPayload = serde_json::from_slice(&body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    tracing::info!(
        tenant_id = %payload.tenant_id,
        tenant_name = %payload.tenant_name,
        domain = payload.domain.as_deref().unwrap_or(""),
        data_keys = payload.data.as_ref().map(|d| d.len()).unwrap_or(0),
        "Tenant initialization webhook received"
    );

    Ok(Json(json!({
        "message": format!("Tenant {} initialized", payload.tenant_id),
    })))
}
