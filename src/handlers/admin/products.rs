use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{ActorType, AuditAction, CreateProduct, Product, UpdateProduct};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".into())
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(input): Json<CreateProduct>,
) -> Result<Json<Product>> {
    input.validate()?;

    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &input, state.now())?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::CreateProduct)
        .resource("product", &product.id.to_string())
        .details(&serde_json::json!({ "name": product.name }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, product_id = product.id, "Product created");

    Ok(Json(product))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Product>>> {
    let conn = state.db.get()?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let (products, total) = queries::list_products_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(products, total, limit, offset)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = queries::get_product_by_id(&conn, id)?.ok_or_else(product_not_found)?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    input.validate()?;

    let conn = state.db.get()?;
    let product =
        queries::update_product(&conn, id, &input, state.now())?.ok_or_else(product_not_found)?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::UpdateProduct)
        .resource("product", &product.id.to_string())
        .details(&serde_json::json!({
            "name": input.name,
            "download_link_changed": input.download_link.is_some(),
        }))
        .save()?;

    Ok(Json(product))
}

/// DELETE /admin/products/{id} - 409 while any order still bundles the product.
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let existing = queries::get_product_by_id(&conn, id)?.ok_or_else(product_not_found)?;
    if !queries::delete_product(&mut conn, id)? {
        return Err(product_not_found());
    }

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::DeleteProduct)
        .resource("product", &id.to_string())
        .details(&serde_json::json!({ "name": existing.name }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, product_id = id, "Product deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}
