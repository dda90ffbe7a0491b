// ============================================================================
// Rate Limiter - fixed-window admission control
// ============================================================================
//
// One window per (client, tenant, route). Windows live in a sharded map;
// reset, increment and compare for a key run while holding that key's shard
// lock, so concurrent callers can never both observe the last free slot.
//
// ============================================================================

use std::time::Duration;

use axum::http::Method;
use dashmap::DashMap;
use tokio::time::Instant;

use gateway_config::RateBudget;

/// Route identity used for budgeting: method plus the route template
/// (e.g. `POST /tenant-api/*endpoint`), not the concrete path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId {
    pub method: Method,
    pub template: &'static str,
}

impl RouteId {
    pub fn new(method: Method, template: &'static str) -> Self {
        Self { method, template }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client: String,
    pub tenant: String,
    pub route: RouteId,
}

impl RateLimitKey {
    pub fn new(client: impl Into<String>, tenant: impl Into<String>, route: RouteId) -> Self {
        Self {
            client: client.into(),
            tenant: tenant.into(),
            route,
        }
    }

    /// Key for routes without an authenticated tenant: one window per caller.
    pub fn per_client(client: impl Into<String>, route: RouteId) -> Self {
        Self::new(client, String::new(), route)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitWindow {
    pub window_start: Instant,
    pub count: u32,
    pub limit: u32,
    pub period: Duration,
}

impl RateLimitWindow {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.period
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<RateLimitKey, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key` and decide whether it may proceed.
    pub fn admit(&self, key: RateLimitKey, budget: RateBudget) -> Admission {
        let now = Instant::now();

        let mut window = self
            .windows
            .entry(key)
            .or_insert_with(|| RateLimitWindow {
                window_start: now,
                count: 0,
                limit: budget.limit,
                period: budget.period,
            });

        if window.is_expired(now) {
            window.window_start = now;
            window.count = 0;
        }
        window.limit = budget.limit;
        window.period = budget.period;
        window.count = window.count.saturating_add(1);

        if window.count <= window.limit {
            Admission::Allowed {
                remaining: window.limit - window.count,
            }
        } else {
            let elapsed = now.saturating_duration_since(window.window_start);
            Admission::Denied {
                retry_after: window.period.saturating_sub(elapsed),
            }
        }
    }

    /// Drop windows that the next admission would reset anyway.
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(client: &str, tenant: &str) -> RateLimitKey {
        RateLimitKey::new(
            client,
            tenant,
            RouteId::new(Method::GET, "/tenant-api/*endpoint"),
        )
    }

    fn budget(limit: u32) -> RateBudget {
        RateBudget::new(limit, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_limit_admissions_per_window() {
        let limiter = RateLimiter::new();

        for i in 0..5 {
            let admission = limiter.admit(key("10.0.0.1", "acme"), budget(5));
            assert_eq!(admission, Admission::Allowed { remaining: 4 - i });
        }
        assert!(!limiter.admit(key("10.0.0.1", "acme"), budget(5)).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_period() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.admit(key("c", "t"), budget(3));
        }

        tokio::time::advance(Duration::from_secs(20)).await;
        match limiter.admit(key("c", "t"), budget(3)) {
            Admission::Denied { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("expected denial, got {:?}", other),
        }

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(
            limiter.admit(key("c", "t"), budget(3)),
            Admission::Allowed { remaining: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.admit(key("c", "acme"), budget(1)).is_allowed());
        assert!(!limiter.admit(key("c", "acme"), budget(1)).is_allowed());

        // Same client, other tenant
        assert!(limiter.admit(key("c", "globex"), budget(1)).is_allowed());
        // Same tenant, other client
        assert!(limiter.admit(key("d", "acme"), budget(1)).is_allowed());
        // Same client and tenant, other route
        let post = RateLimitKey::new("c", "acme", RouteId::new(Method::POST, "/graphql"));
        assert!(limiter.admit(post, budget(1)).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_client_key_ignores_tenant() {
        let limiter = RateLimiter::new();
        let route = || RouteId::new(Method::POST, "/tts");

        assert!(limiter.admit(RateLimitKey::per_client("c", route()), budget(1)).is_allowed());
        assert!(!limiter.admit(RateLimitKey::per_client("c", route()), budget(1)).is_allowed());
        assert!(limiter.admit(RateLimitKey::per_client("d", route()), budget(1)).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_only_drops_stale_windows() {
        let limiter = RateLimiter::new();
        limiter.admit(key("old", "t"), budget(1));
        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.admit(key("fresh", "t"), budget(1));

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.len(), 1);
        assert!(!limiter.admit(key("fresh", "t"), budget(1)).is_allowed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_admissions_respect_limit() {
        let limiter = Arc::new(RateLimiter::new());
        let limit = 100;

        let handles: Vec<_> = (0..400)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit(key("c", "t"), budget(limit)).is_allowed() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, limit);
    }
}
