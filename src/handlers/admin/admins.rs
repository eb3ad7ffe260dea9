use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{ActorType, Admin, AdminWithKey, AuditAction, CreateAdmin};
use crate::util::AuditLogBuilder;

/// POST /admin/admins - the API key is in this response and nowhere else.
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(input): Json<CreateAdmin>,
) -> Result<Json<AdminWithKey>> {
    input.validate()?;

    let conn = state.db.get()?;
    let (admin, api_key) = queries::create_admin(&conn, &input, state.now())?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::CreateAdmin)
        .resource("admin", &admin.id.to_string())
        .details(&serde_json::json!({ "username": admin.username }))
        .save()?;

    tracing::info!(admin = %ctx.admin.username, created = %admin.username, "Admin created");

    Ok(Json(AdminWithKey { admin, api_key }))
}

pub async fn list_admins(State(state): State<AppState>) -> Result<Json<Vec<Admin>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_admins(&conn)?))
}

pub async fn delete_admin(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    if !queries::delete_admin(&mut conn, id, ctx.admin.id)? {
        return Err(AppError::NotFound("Admin not found".into()));
    }

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::DeleteAdmin)
        .resource("admin", &id.to_string())
        .save()?;

    Ok(Json(serde_json::json!({ "success": true })))
}
