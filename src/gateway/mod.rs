// ============================================================================
// Tenant Gateway
// ============================================================================
//
// Single entry point in front of the tenant backend.
// It handles:
// - JWT verification and tenant resolution
// - Fixed-window rate limiting per client, tenant and route
// - Forwarding to the tenant backend, GraphQL and speech upstreams
// - Request count and latency metrics
//
// ============================================================================

pub mod pipeline;
pub mod router;
pub mod service_client;
pub mod timing;

pub use pipeline::{BodyPolicy, GatewayPipeline, GraphQlRequest, InboundRequest, RouteSpec};
pub use router::GatewayState;
pub use service_client::{Forwarder, ProxyOutcome, ProxyRequest, ServiceClient, UpstreamTarget};
pub use timing::RequestTimer;
