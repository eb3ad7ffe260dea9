//! Claimdrop - order-claim service for digital downloads
//!
//! A seller issues an order identifier; the buyer redeems it for the download
//! links of the products bundled with the order, subject to the order's
//! expiration and one-time-use policy. This library holds the claim engine,
//! the SQLite-backed order ledger and catalog, and the HTTP handlers.

pub mod claim;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod util;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;
use crate::rate_limit::RateLimitConfig;

/// The full HTTP application. Pass `None` for `rate_limit` when requests are
/// not served through `into_make_service_with_connect_info`.
pub fn build_app(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router {
    Router::new()
        .merge(handlers::public::router(rate_limit))
        .merge(handlers::admin::router(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
