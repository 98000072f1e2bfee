use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const WINDOW_SECONDS: i64 = 60;
const MAX_TRACKED_KEYS: usize = 10_000;

struct Counter {
    window_start: i64,
    count: u32,
}

/// Fixed-window rate limiter: every key gets a 60-second window aligned to
/// absolute wall-clock boundaries (`now / 60`), not a rolling window from
/// first use. Once a key's window elapses the counter resets to zero
/// rather than decaying gradually.
///
/// State lives in-memory only, same as the gateway's request-count
/// limiter; a multi-instance deployment needs a shared store instead.
pub struct RateLimiter {
    counters: Mutex<HashMap<String, Counter>>,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { counters: Mutex::new(HashMap::new()) }
    }

    pub fn check(&self, key: &str, limit_per_window: u32) -> RateLimitDecision {
        let now = current_unix_seconds();
        let window_start = now - (now % WINDOW_SECONDS);
        let reset_at = window_start + WINDOW_SECONDS;

        let mut counters = self.counters.lock().expect("rate limiter mutex poisoned");

        if counters.len() >= MAX_TRACKED_KEYS && !counters.contains_key(key) {
            counters.retain(|_, c| c.window_start == window_start);
        }

        let counter = counters.entry(key.to_string()).or_insert(Counter { window_start, count: 0 });
        if counter.window_start != window_start {
            counter.window_start = window_start;
            counter.count = 0;
        }

        if counter.count >= limit_per_window {
            return RateLimitDecision { allowed: false, remaining: 0, reset_at };
        }

        counter.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: limit_per_window - counter.count,
            reset_at,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn current_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Enforces the per-principal, per-route-class limit and turns a rejection
/// into the shaped `ApiError::RateLimited` response, including the
/// `remaining`/`reset_at` fields clients use to back off correctly.
///
/// Keyed by `(tenant_id, principal_user_id, route_class)` so one noisy user
/// can't exhaust the budget for every other member of the same tenant.
pub fn enforce(
    limiter: &RateLimiter,
    metrics: &common_observability::ControlPlaneMetrics,
    tenant_id: uuid::Uuid,
    principal_user_id: uuid::Uuid,
    route_class: &str,
    limit_per_window: u32,
    trace_id: Option<uuid::Uuid>,
) -> Result<(), common_http_errors::ApiError> {
    let key = format!("{tenant_id}:{principal_user_id}:{route_class}");
    let decision = limiter.check(&key, limit_per_window);
    if decision.allowed {
        Ok(())
    } else {
        metrics
            .rate_limited_total
            .with_label_values(&[&tenant_id.to_string(), route_class])
            .inc();
        Err(common_http_errors::ApiError::RateLimited {
            remaining: decision.remaining,
            reset_at: decision.reset_at,
            trace_id,
        })
    }
}

/// Shared read-route guard: every handler module calls this (or
/// [`write_limit`]) before touching the database, keyed per-principal so one
/// noisy user can't starve the rest of their tenant.
pub fn read_limit(
    state: &crate::app::AppState,
    ctx: &common_security::TenantContext,
) -> Result<(), common_http_errors::ApiError> {
    enforce(
        &state.rate_limiter,
        &state.metrics,
        ctx.tenant_id,
        ctx.principal_user_id,
        "read",
        state.rate_limit_reads_per_min,
        ctx.trace_id,
    )
}

/// Shared write-route guard, see [`read_limit`].
pub fn write_limit(
    state: &crate::app::AppState,
    ctx: &common_security::TenantContext,
) -> Result<(), common_http_errors::ApiError> {
    enforce(
        &state.rate_limiter,
        &state.metrics,
        ctx.tenant_id,
        ctx.principal_user_id,
        "write",
        state.rate_limit_writes_per_min,
        ctx.trace_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("tenant-a:read", 5).allowed);
        }
        assert!(!limiter.check("tenant-a:read", 5).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("tenant-a:read", 5).allowed);
        }
        assert!(limiter.check("tenant-b:read", 5).allowed);
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = RateLimiter::new();
        let first = limiter.check("tenant-a:write", 3);
        assert_eq!(first.remaining, 2);
        let second = limiter.check("tenant-a:write", 3);
        assert_eq!(second.remaining, 1);
    }
}
