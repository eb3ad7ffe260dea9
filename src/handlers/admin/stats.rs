use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::DashboardStats;

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    let conn = state.db.get()?;
    Ok(Json(queries::get_dashboard_stats(&conn)?))
}
