//! # Request Throttling
//!
//! A single process-wide governor bucket guards every route.
//!
//! `MURMUR_RATE_LIMIT` sets the refill rate in requests per second; unset
//! defaults to 100, and 0 removes the layer entirely.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests per second when `MURMUR_RATE_LIMIT` is unset.
const DEFAULT_RATE: u32 = 100;

// =============================================================================
// RATE LIMIT
// =============================================================================

/// Process-wide request throttle, shared across all connections.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    rate: u32,
}

impl RateLimit {
    /// Build a throttle refilling at `rate` requests per second. A zero rate
    /// is clamped to one; callers disable the layer by not installing it.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            rate: rate.max(1),
        }
    }

    /// Read `MURMUR_RATE_LIMIT` and build the throttle. Returns `None` when
    /// the variable is set to 0, meaning no throttling at all.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let rate = std::env::var("MURMUR_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE);
        (rate > 0).then(|| Self::new(rate))
    }

    /// The configured requests-per-second rate.
    #[must_use]
    pub fn rate(&self) -> u32 {
        self.rate
    }
}

/// Middleware rejecting requests above the configured rate with `429`.
pub async fn throttle(
    State(limit): State<RateLimit>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limit.limiter.check().is_err() {
        tracing::warn!(
            event = "rate_limited",
            rate = limit.rate,
            "Request rejected by rate limiter"
        );
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_limiter_admits_a_request() {
        let limit = RateLimit::new(50);
        assert!(limit.limiter.check().is_ok());
    }

    #[test]
    fn zero_rate_is_clamped() {
        let limit = RateLimit::new(0);
        assert_eq!(limit.rate(), 1);
        assert!(limit.limiter.check().is_ok());
    }

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limit = RateLimit::new(2);
        let admitted = (0..10).filter(|_| limit.limiter.check().is_ok()).count();
        assert!(admitted < 10);
    }
}
