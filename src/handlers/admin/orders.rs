use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{
    ActorType, AuditAction, CreateOrder, DeleteOrderQuery, Order, OrderListQuery, OrderView,
    UpdateOrder,
};
use crate::pagination::Paginated;
use crate::util::AuditLogBuilder;

fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".into())
}

fn order_view(conn: &Connection, order: Order, now: i64) -> Result<OrderView> {
    let product_ids = queries::list_order_product_ids(conn, order.id)?;
    Ok(OrderView::new(order, product_ids, now))
}

/// POST /admin/orders - unspecified policy fields come from the current
/// settings and are frozen into the order.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(input): Json<CreateOrder>,
) -> Result<Json<OrderView>> {
    input.validate()?;

    let now = state.now();
    let mut conn = state.db.get()?;
    let order = queries::create_order(&mut conn, &input, now)?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, now)
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::CreateOrder)
        .resource("order", &order.id.to_string())
        .details(&serde_json::json!({
            "order_id": order.order_id,
            "product_ids": input.product_ids,
            "expires_at": order.expires_at,
            "one_time_use": order.one_time_use,
        }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, order_id = %order.order_id, "Order created");

    Ok(Json(order_view(&conn, order, now)?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderView>>> {
    let now = state.now();
    let conn = state.db.get()?;
    let pagination = query.pagination();
    let limit = pagination.limit();
    let offset = pagination.offset();

    let (orders, total) =
        queries::list_orders_paginated(&conn, query.status, query.search.as_deref(), limit, offset)?;
    let views = orders
        .into_iter()
        .map(|order| order_view(&conn, order, now))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(Paginated::new(views, total, limit, offset)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, id)?.ok_or_else(order_not_found)?;
    Ok(Json(order_view(&conn, order, state.now())?))
}

/// PUT /admin/orders - edit policy fields and/or replace the product set.
pub async fn update_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(input): Json<UpdateOrder>,
) -> Result<Json<OrderView>> {
    input.validate()?;

    let now = state.now();
    let mut conn = state.db.get()?;
    let order = queries::update_order(&mut conn, &input, state.reset_claims_on_one_time_flip, now)?
        .ok_or_else(order_not_found)?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, now)
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::UpdateOrder)
        .resource("order", &order.id.to_string())
        .details(&serde_json::json!({
            "order_id": order.order_id,
            "product_ids": input.product_ids,
            "one_time_use": order.one_time_use,
            "expires_at": order.expires_at,
            "claim_count": order.claim_count,
        }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, order_id = %order.order_id, "Order updated");

    Ok(Json(order_view(&conn, order, now)?))
}

/// DELETE /admin/orders?id=N
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<DeleteOrderQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let existing = queries::get_order_by_id(&conn, query.id)?.ok_or_else(order_not_found)?;
    if !queries::delete_order(&mut conn, query.id)? {
        return Err(order_not_found());
    }

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::DeleteOrder)
        .resource("order", &query.id.to_string())
        .details(&serde_json::json!({
            "order_id": existing.order_id,
            "claim_count": existing.claim_count,
        }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, order_id = %existing.order_id, "Order deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}
