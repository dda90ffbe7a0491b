// ============================================================================
// Gateway Config - Centralized configuration management
// ============================================================================
//
// Loads the tenant gateway configuration from environment variables
// (optionally seeded from a .env file) with sensible defaults.
//
// ============================================================================

mod constants;
mod rate_limits;
mod upstream;

pub use constants::{MAX_REQUEST_BODY_SIZE, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
pub use rate_limits::{RateBudget, RateLimitConfig};
pub use upstream::UpstreamConfig;

use anyhow::Result;
use constants::*;

/// Main configuration structure for the gateway
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,

    /// HS256 secret shared with the token issuer
    pub jwt_secret: String,

    /// Version reported by the `gateway_info` metric
    pub version: String,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    pub rust_log: String,

    /// Take the caller address from X-Forwarded-For / X-Real-IP.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_headers: bool,

    /// Error tracking; disabled when unset
    pub sentry_dsn: Option<String>,
    pub app_env: String,

    // Sub-configurations
    pub upstream: UpstreamConfig,
    pub rate_limits: RateLimitConfig,
}

impl Config {
    /// Configuration with every default applied and the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            jwt_secret: jwt_secret.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cors_origins: parse_origins(DEFAULT_CORS_ORIGINS),
            rust_log: "info".to_string(),
            trust_forwarded_headers: false,
            sentry_dsn: None,
            app_env: DEFAULT_APP_ENV.to_string(),
            upstream: UpstreamConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must be set (it must match the token issuer's signing secret)");
        }

        let upstream = UpstreamConfig::from_env();
        let rate_limits = RateLimitConfig::from_env()?;

        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),

            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),

            jwt_secret,

            version: std::env::var("APP_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),

            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
            ),

            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            trust_forwarded_headers: std::env::var("TRUST_FORWARDED_HEADERS")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            sentry_dsn: std::env::var("SENTRY_DSN")
                .ok()
                .map(|dsn| dsn.trim().to_string())
                .filter(|dsn| !dsn.is_empty()),

            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_APP_ENV.to_string()),

            upstream,
            rate_limits,
        })
    }

    /// Socket address string the listener binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_trims_and_skips_empty() {
        let origins = parse_origins(" http://a.test , ,http://b.test,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }

    #[test]
    fn test_new_applies_defaults() {
        let config = Config::new("secret");
        assert_eq!(config.jwt_secret, "secret");
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
        assert_eq!(config.upstream.tenant_segment, "tenant-routes");
        assert_eq!(config.upstream.graphql_timeout_secs, 60);
        assert!(config.upstream.graphql_timeout() > config.upstream.tenant_api_timeout());
        assert!(!config.trust_forwarded_headers);
        assert!(config.sentry_dsn.is_none());
        assert_eq!(config.app_env, "development");
    }
}
