//! Test utilities and fixtures for Claimdrop integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub use claimdrop::clock::{Clock, ManualClock, SECONDS_PER_DAY};
pub use claimdrop::db::{AppState, create_pool, init_db, queries};
pub use claimdrop::models::*;

/// Fixed starting point for the manual clock (2023-11-14T22:13:20Z).
pub const T0: i64 = 1_700_000_000;

/// A database in its own temp directory plus the state wired to it.
///
/// The database is a file rather than `:memory:` so every pooled connection
/// sees the same data.
pub struct TestContext {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_flip_reset(true)
    }

    /// `reset_on_flip` is the configured default for zeroing the claim count
    /// when an order is switched from multi-use to one-time.
    pub fn with_flip_reset(reset_on_flip: bool) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("claimdrop-test.db");
        let pool = create_pool(path.to_str().expect("temp path is utf-8"))
            .expect("Failed to create pool");
        {
            let conn = pool.get().unwrap();
            init_db(&conn).expect("Failed to initialize schema");
        }

        let clock = Arc::new(ManualClock::new(T0));
        let state = AppState {
            db: pool,
            clock: clock.clone(),
            audit_log_enabled: true,
            reset_claims_on_one_time_flip: reset_on_flip,
        };

        Self {
            state,
            clock,
            _dir: dir,
        }
    }

    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get connection")
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Full router without rate limiting.
    pub fn app(&self) -> Router {
        claimdrop::build_app(self.state.clone(), None)
    }
}

pub fn create_test_product(ctx: &TestContext, name: &str, download_link: &str) -> Product {
    let input = CreateProduct {
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        download_link: download_link.to_string(),
        image_url: None,
    };
    queries::create_product(&ctx.conn(), &input, ctx.now()).expect("Failed to create test product")
}

pub fn create_test_order(
    ctx: &TestContext,
    order_id: &str,
    product_ids: &[i64],
    expiration_days: Option<i32>,
    one_time_use: bool,
) -> Order {
    let input = CreateOrder {
        order_id: order_id.to_string(),
        product_ids: product_ids.to_vec(),
        expiration_days,
        one_time_use: Some(one_time_use),
    };
    queries::create_order(&mut ctx.conn(), &input, ctx.now()).expect("Failed to create test order")
}

pub fn create_test_admin(ctx: &TestContext, username: &str) -> (Admin, String) {
    let input = CreateAdmin {
        username: username.to_string(),
    };
    queries::create_admin(&ctx.conn(), &input, ctx.now()).expect("Failed to create test admin")
}

pub fn get_order(ctx: &TestContext, order_id: &str) -> Order {
    queries::find_order_by_identifier(&ctx.conn(), order_id)
        .unwrap()
        .expect("order should exist")
}

/// Send a request through the router and decode the JSON response body
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    api_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_claim(app: Router, order_id: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/claim",
        Some(serde_json::json!({ "orderId": order_id })),
        None,
    )
    .await
}
