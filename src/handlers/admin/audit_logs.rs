use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{AuditLog, AuditLogQuery};
use crate::pagination::Paginated;

/// GET /admin/audit-logs - newest first, optionally filtered by action or
/// resource type.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLog>>> {
    let conn = state.db.get()?;
    let pagination = query.pagination();
    let (logs, total) = queries::query_audit_logs(&conn, &query)?;
    Ok(Json(Paginated::new(
        logs,
        total,
        pagination.limit(),
        pagination.offset(),
    )))
}
