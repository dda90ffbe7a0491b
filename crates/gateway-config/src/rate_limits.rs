// ============================================================================
// Rate Limit Configuration
// ============================================================================
//
// Budgets are written as "<count>/<unit>" where unit is second, minute,
// hour or day (e.g. "100/minute").
//
// ============================================================================

use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;

/// Admission budget for one route class: `limit` requests per `period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateBudget {
    pub limit: u32,
    pub period: Duration,
}

impl RateBudget {
    pub const fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(SECONDS_PER_MINUTE))
    }
}

impl FromStr for RateBudget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (count, unit) = s
            .split_once('/')
            .with_context(|| format!("Invalid rate budget '{}': expected <count>/<unit>", s))?;

        let limit: u32 = count
            .trim()
            .parse()
            .with_context(|| format!("Invalid rate budget count in '{}'", s))?;

        let secs = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" => 1,
            "minute" | "minutes" | "m" => SECONDS_PER_MINUTE,
            "hour" | "hours" | "h" => SECONDS_PER_HOUR,
            "day" | "days" | "d" => SECONDS_PER_DAY,
            other => anyhow::bail!(
                "Invalid rate budget unit '{}' in '{}'. Must be second, minute, hour or day",
                other,
                s
            ),
        };

        Ok(Self::new(limit, Duration::from_secs(secs)))
    }
}

impl fmt::Display for RateBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.limit, self.period.as_secs())
    }
}

/// Per-route admission budgets
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Tenant forwarding routes (/tenant-api/*)
    pub tenant_api: RateBudget,
    /// GraphQL proxy
    pub graphql: RateBudget,
    /// Text-to-speech pass-through (expensive external call, tightest budget)
    pub tts: RateBudget,
    /// Interval for dropping expired windows from the limiter
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tenant_api: RateBudget::per_minute(100),
            graphql: RateBudget::per_minute(50),
            tts: RateBudget::per_minute(10),
            sweep_interval_secs: DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl RateLimitConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Ok(Self {
            tenant_api: budget_from_env("TENANT_API_RATE_LIMIT", DEFAULT_TENANT_API_RATE_LIMIT)?,
            graphql: budget_from_env("GRAPHQL_RATE_LIMIT", DEFAULT_GRAPHQL_RATE_LIMIT)?,
            tts: budget_from_env("TTS_RATE_LIMIT", DEFAULT_TTS_RATE_LIMIT)?,
            sweep_interval_secs: std::env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS),
        })
    }
}

fn budget_from_env(key: &str, default: &str) -> Result<RateBudget> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().with_context(|| format!("Failed to parse {}", key))
}
