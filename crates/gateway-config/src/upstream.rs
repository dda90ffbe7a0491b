// ============================================================================
// Upstream Configuration
// ============================================================================

use std::time::Duration;

use crate::constants::*;

/// Where the gateway forwards to, and how long it waits
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Tenant backend base URL (e.g., "http://laravel:8000")
    pub backend_base_url: String,
    /// Path segment inserted between the base URL and the forwarded path
    pub tenant_segment: String,
    /// Fixed GraphQL endpoint
    pub graphql_url: String,
    /// Speech synthesis endpoint
    pub tts_url: String,
    /// API key appended to the speech synthesis call (None = route disabled)
    pub tts_api_key: Option<String>,
    pub tenant_api_timeout_secs: u64,
    pub graphql_timeout_secs: u64,
    pub tts_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_BASE_URL.to_string(),
            tenant_segment: DEFAULT_TENANT_SEGMENT.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            tts_api_key: None,
            tenant_api_timeout_secs: DEFAULT_TENANT_API_TIMEOUT_SECS,
            graphql_timeout_secs: DEFAULT_GRAPHQL_TIMEOUT_SECS,
            tts_timeout_secs: DEFAULT_TTS_TIMEOUT_SECS,
        }
    }
}

impl UpstreamConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            backend_base_url: std::env::var("BACKEND_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_BASE_URL.to_string()),
            tenant_segment: std::env::var("BACKEND_TENANT_SEGMENT")
                .unwrap_or_else(|_| DEFAULT_TENANT_SEGMENT.to_string()),
            graphql_url: std::env::var("GRAPHQL_URL")
                .unwrap_or_else(|_| DEFAULT_GRAPHQL_URL.to_string()),
            tts_url: std::env::var("TTS_URL").unwrap_or_else(|_| DEFAULT_TTS_URL.to_string()),
            tts_api_key: std::env::var("TTS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            tenant_api_timeout_secs: std::env::var("TENANT_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TENANT_API_TIMEOUT_SECS),
            graphql_timeout_secs: std::env::var("GRAPHQL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GRAPHQL_TIMEOUT_SECS),
            tts_timeout_secs: std::env::var("TTS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TTS_TIMEOUT_SECS),
        }
    }

    pub fn tenant_api_timeout(&self) -> Duration {
        Duration::from_secs(self.tenant_api_timeout_secs)
    }

    pub fn graphql_timeout(&self) -> Duration {
        Duration::from_secs(self.graphql_timeout_secs)
    }

    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout_secs)
    }
}
