use std::borrow::Cow;

use anyhow::{Context, Result};
use sentry::types::Dsn;

use crate::Config;

/// Sentry client options for this deployment, or `None` when `SENTRY_DSN`
/// is not configured.
pub fn sentry_options(config: &Config) -> Result<Option<sentry::ClientOptions>> {
    let Some(raw) = config.sentry_dsn.as_deref() else {
        return Ok(None);
    };
    let dsn: Dsn = raw.parse().context("SENTRY_DSN is not a valid DSN")?;

    Ok(Some(sentry::ClientOptions {
        dsn: Some(dsn),
        release: Some(Cow::Owned(format!(
            "{}@{}",
            env!("CARGO_PKG_NAME"),
            config.version
        ))),
        environment: Some(Cow::Owned(config.app_env.clone())),
        traces_sample_rate: 1.0,
        ..Default::default()
    }))
}
