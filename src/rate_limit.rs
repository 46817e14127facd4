//! Rate limiting configuration for public endpoints.
//!
//! Rate limits are applied per-IP address to protect against DoS attacks.
//! Brute force against key codes is not a practical concern (103 bits of
//! entropy), but transfer codes are 6 digits, so the standard tier also
//! covers `/transfer/confirm`.
//!
//! Tiers:
//! - Standard: /validate, /transfer/confirm
//! - Relaxed: /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_STANDARD_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

use crate::db::AppState;

/// Wrap a router with a per-IP rate limit of the given requests per minute.
fn apply_limit(router: Router<AppState>, requests_per_minute: u32) -> Router<AppState> {
    assert!(requests_per_minute > 0, "Rate limit must be greater than 0");

    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("Failed to build rate limiter config");

    router.layer(GovernorLayer::new(Arc::new(config)))
}

/// Standard tier: endpoints that do crypto/DB operations.
pub fn standard(router: Router<AppState>, requests_per_minute: u32) -> Router<AppState> {
    apply_limit(router, requests_per_minute)
}

/// Relaxed tier: lightweight endpoints like health checks.
pub fn relaxed(router: Router<AppState>, requests_per_minute: u32) -> Router<AppState> {
    apply_limit(router, requests_per_minute)
}
