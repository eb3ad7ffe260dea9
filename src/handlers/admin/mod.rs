mod admins;
mod audit_logs;
mod orders;
mod products;
mod settings;
mod stats;

pub use admins::*;
pub use audit_logs::*;
pub use orders::*;
pub use products::*;
pub use settings::*;
pub use stats::*;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::db::AppState;
use crate::middleware::admin_auth;
use crate::rate_limit::{self, RateLimitConfig};

pub fn router(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let routes = Router::new()
        // Policy settings
        .route("/admin/settings", get(get_settings))
        .route("/admin/settings", put(update_settings))
        // Catalog
        .route("/admin/products", post(create_product))
        .route("/admin/products", get(list_products))
        .route("/admin/products/{id}", get(get_product))
        .route("/admin/products/{id}", put(update_product))
        .route("/admin/products/{id}", delete(delete_product))
        // Orders (edit and delete identify the order by internal id in body/query)
        .route("/admin/orders", post(create_order))
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders", put(update_order))
        .route("/admin/orders", delete(delete_order))
        .route("/admin/orders/{id}", get(get_order))
        // Admin accounts
        .route("/admin/admins", post(create_admin))
        .route("/admin/admins", get(list_admins))
        .route("/admin/admins/{id}", delete(delete_admin))
        .route("/admin/audit-logs", get(list_audit_logs))
        .route("/admin/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(state, admin_auth));

    match rate_limit {
        Some(config) => routes.layer(rate_limit::admin_layer(&config)),
        None => routes,
    }
}
