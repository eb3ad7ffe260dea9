use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::{ActorType, AuditAction, PolicySettings, UpdateSettings};
use crate::util::AuditLogBuilder;

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<PolicySettings>> {
    let conn = state.db.get()?;
    Ok(Json(queries::get_policy_settings(&conn)?))
}

/// PUT /admin/settings - change the defaults used for orders created from now on.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(input): Json<UpdateSettings>,
) -> Result<Json<PolicySettings>> {
    input.validate()?;

    let mut conn = state.db.get()?;
    let settings = queries::update_policy_settings(&mut conn, &input, state.now())?;

    AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
        .actor(ActorType::Admin, Some(ctx.admin.id))
        .actor_name(&ctx.admin.username)
        .action(AuditAction::UpdateSettings)
        .resource("settings", "policy")
        .details(&serde_json::to_value(settings)?)
        .save()?;

    tracing::info!(
        admin = %ctx.admin.username,
        default_expiration_days = ?settings.default_expiration_days,
        default_one_time_use = settings.default_one_time_use,
        "Policy settings updated"
    );

    Ok(Json(settings))
}
