// ============================================================================
// Gateway State
// ============================================================================
//
// Shared state behind every handler:
// - the pipeline (validator, limiter, metrics, forwarder)
// - the route table for the forwarding routes
// - the text-to-speech endpoint settings
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::auth::TokenValidator;
use crate::gateway::pipeline::{BodyPolicy, GatewayPipeline, RouteSpec};
use crate::gateway::service_client::{Forwarder, ServiceClient, UpstreamTarget};
use crate::gateway::timing::describe_request_metrics;
use crate::rate_limit::RateLimiter;
use gateway_config::{Config, RateBudget};
use gateway_metrics::MetricsRegistry;

pub const TENANT_API_TEMPLATE: &str = "/tenant-api/*endpoint";
pub const GRAPHQL_TEMPLATE: &str = "/graphql";
pub const TTS_TEMPLATE: &str = "/tts";

/// Speech synthesis pass-through settings
#[derive(Debug, Clone)]
pub struct TtsRoute {
    pub url: String,
    pub api_key: Option<String>,
    pub budget: RateBudget,
    pub timeout: Duration,
}

pub struct GatewayState {
    pub config: Arc<Config>,
    pub pipeline: GatewayPipeline,
    pub tenant_api: RouteSpec,
    pub graphql: RouteSpec,
    pub tts: TtsRoute,
}

impl GatewayState {
    /// Build state with the reqwest-backed forwarder.
    pub fn new(config: Arc<Config>) -> Result<Arc<Self>> {
        let forwarder: Arc<dyn Forwarder> = Arc::new(ServiceClient::new()?);
        Self::with_forwarder(config, forwarder)
    }

    pub fn with_forwarder(config: Arc<Config>, forwarder: Arc<dyn Forwarder>) -> Result<Arc<Self>> {
        let metrics = Arc::new(MetricsRegistry::new(&config.version)?);
        describe_request_metrics(&metrics);

        let pipeline = GatewayPipeline::new(
            TokenValidator::new(&config.jwt_secret),
            Arc::new(RateLimiter::new()),
            metrics,
            forwarder,
        )
        .with_trusted_forwarding(config.trust_forwarded_headers);

        let upstream = &config.upstream;
        let limits = &config.rate_limits;

        let tenant_api = RouteSpec {
            template: TENANT_API_TEMPLATE,
            budget: limits.tenant_api,
            timeout: upstream.tenant_api_timeout(),
            target: UpstreamTarget::TenantBackend {
                base_url: upstream.backend_base_url.clone(),
                segment: upstream.tenant_segment.clone(),
            },
            body: BodyPolicy::Json,
        };
        let graphql = RouteSpec {
            template: GRAPHQL_TEMPLATE,
            budget: limits.graphql,
            timeout: upstream.graphql_timeout(),
            target: UpstreamTarget::Fixed {
                url: upstream.graphql_url.clone(),
            },
            body: BodyPolicy::GraphQl,
        };
        let tts = TtsRoute {
            url: upstream.tts_url.clone(),
            api_key: upstream.tts_api_key.clone(),
            budget: limits.tts,
            timeout: upstream.tts_timeout(),
        };

        tracing::info!(
            backend = %upstream.backend_base_url,
            graphql = %upstream.graphql_url,
            tenant_api_budget = %tenant_api.budget,
            graphql_budget = %graphql.budget,
            tts_budget = %tts.budget,
            trust_forwarded_headers = config.trust_forwarded_headers,
            "Gateway routes configured"
        );

        Ok(Arc::new(Self {
            config,
            pipeline,
            tenant_api,
            graphql,
            tts,
        }))
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        self.pipeline.metrics()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.pipeline.limiter()
    }
}
