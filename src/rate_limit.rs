//! Per-IP rate limiting for the HTTP surface.
//!
//! Tiers:
//! - Claim: POST /claim
//! - Admin: everything under /admin
//! - Relaxed: /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_CLAIM_RPM (default: 30)
//! - RATE_LIMIT_ADMIN_RPM (default: 120)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)
//!
//! The layers only reject excess traffic; they never change what a claim does.

use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

/// Requests-per-minute for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub claim_rpm: u32,
    pub admin_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            claim_rpm: 30,
            admin_rpm: 120,
            relaxed_rpm: 60,
        }
    }
}

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Replenish one token every `60 / rpm` seconds, allow bursts of `rpm`.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let requests_per_minute = requests_per_minute.max(1);
    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("period and burst size are non-zero");

    GovernorLayer::new(Arc::new(config))
}

pub fn claim_layer(config: &RateLimitConfig) -> RateLimitLayer {
    create_layer(config.claim_rpm)
}

pub fn admin_layer(config: &RateLimitConfig) -> RateLimitLayer {
    create_layer(config.admin_rpm)
}

pub fn relaxed_layer(config: &RateLimitConfig) -> RateLimitLayer {
    create_layer(config.relaxed_rpm)
}
