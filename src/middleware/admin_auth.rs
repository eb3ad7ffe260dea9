use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::crypto::key_hint;
use crate::db::{AppState, queries};
use crate::models::Admin;
use crate::util::extract_bearer_token;

/// The authenticated admin, inserted into request extensions by `admin_auth`.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin: Admin,
    /// Log-safe prefix of the key used for this request.
    pub key_hint: String,
}

/// Resolve the admin behind a bearer API key.
fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminContext, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let conn = state.db.get().map_err(|e| {
        tracing::error!("Failed to get db connection for admin auth: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let admin = queries::get_admin_by_api_key(&conn, token, state.now())
        .map_err(|e| {
            tracing::error!("Admin lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            tracing::debug!("Rejected admin key {}", key_hint(token));
            StatusCode::UNAUTHORIZED
        })?;

    Ok(AdminContext {
        admin,
        key_hint: key_hint(token),
    })
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ctx = authenticate_admin(&state, request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
