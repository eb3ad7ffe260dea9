mod claim;

pub use claim::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::rate_limit::{self, RateLimitConfig};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Public routes. `rate_limit` is None in tests, where requests carry no
/// peer address for the per-IP limiter to key on.
pub fn router(rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let health_routes = Router::new().route("/health", get(health));
    let claim_routes = Router::new().route("/claim", post(claim_order));

    match rate_limit {
        Some(config) => health_routes
            .layer(rate_limit::relaxed_layer(&config))
            .merge(claim_routes.layer(rate_limit::claim_layer(&config))),
        None => health_routes.merge(claim_routes),
    }
}
