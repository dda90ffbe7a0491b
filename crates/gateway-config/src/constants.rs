// ============================================================================
// Configuration Constants
// ============================================================================

// Default listener values
pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

// Default upstream endpoints
pub(crate) const DEFAULT_BACKEND_BASE_URL: &str = "http://laravel:8000";
pub(crate) const DEFAULT_TENANT_SEGMENT: &str = "tenant-routes";
pub(crate) const DEFAULT_GRAPHQL_URL: &str = "http://laravel:8000/graphql";
pub(crate) const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

// Default per-route timeouts (in seconds)
pub(crate) const DEFAULT_TENANT_API_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_GRAPHQL_TIMEOUT_SECS: u64 = 60;
pub(crate) const DEFAULT_TTS_TIMEOUT_SECS: u64 = 30;

// Default per-route rate budgets (<count>/<unit>)
pub(crate) const DEFAULT_TENANT_API_RATE_LIMIT: &str = "100/minute";
pub(crate) const DEFAULT_GRAPHQL_RATE_LIMIT: &str = "50/minute";
pub(crate) const DEFAULT_TTS_RATE_LIMIT: &str = "10/minute";

// How often expired rate-limit windows are dropped
pub(crate) const DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS: u64 = 300;

pub(crate) const DEFAULT_APP_ENV: &str = "development";

pub(crate) const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost";

// Time conversion constants
pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 3600;
pub const SECONDS_PER_DAY: u64 = 86400;

/// Maximum accepted inbound request body (2 MB)
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024;
