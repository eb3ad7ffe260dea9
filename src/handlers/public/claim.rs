use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::claim::{ClaimOutcome, attempt_claim};
use crate::db::AppState;
use crate::error::{AppError, msg};
use crate::models::{ActorType, AuditAction, ClaimedProduct, is_valid_order_identifier};
use crate::util::AuditLogBuilder;

/// Body for POST /claim. Accepts `orderId` or `order_id`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    #[serde(default, rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ClaimedProduct>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_count: Option<i64>,
}

impl ClaimResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            products: None,
            download_links: None,
            claim_count: None,
        }
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(ClaimResponse::failure(message))).into_response()
}

/// Validate the request shape before anything touches the database.
fn parse_order_identifier(
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<String, &'static str> {
    let Ok(Json(request)) = payload else {
        return Err(msg::ORDER_ID_REQUIRED);
    };
    let order_id = request
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(msg::ORDER_ID_REQUIRED)?;
    if !is_valid_order_identifier(&order_id) {
        return Err(msg::ORDER_ID_INVALID);
    }
    Ok(order_id)
}

/// POST /claim - redeem an order for its download links.
pub async fn claim_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> Response {
    let order_identifier = match parse_order_identifier(payload) {
        Ok(id) => id,
        Err(message) => return reject(StatusCode::BAD_REQUEST, message),
    };

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(order_id = %order_identifier, "Claim failed, no db connection: {}", e);
            return AppError::from(e).into_response();
        }
    };

    let outcome = match attempt_claim(&mut conn, state.clock.as_ref(), &order_identifier) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(order_id = %order_identifier, "Claim failed: {}", e);
            return e.into_response();
        }
    };

    match outcome {
        ClaimOutcome::Rejected(rejection) => {
            tracing::debug!(
                order_id = %order_identifier,
                outcome = rejection.as_ref(),
                "Claim rejected"
            );
            reject(rejection.status_code(), rejection.message())
        }
        ClaimOutcome::Success(success) => {
            tracing::info!(
                order_id = %order_identifier,
                claim_count = success.claim_count,
                products = success.products.len(),
                "Order claimed"
            );

            // The claim is already committed; an audit failure only gets logged.
            let details = serde_json::json!({
                "order_id": order_identifier,
                "claim_count": success.claim_count,
                "status": success.status,
            });
            let resource_id = success.order_id.to_string();
            if let Err(e) = AuditLogBuilder::new(&conn, state.audit_log_enabled, &headers, state.now())
                .actor(ActorType::Public, None)
                .action(AuditAction::ClaimOrder)
                .resource("order", &resource_id)
                .details(&details)
                .save()
            {
                tracing::warn!(order_id = %order_identifier, "Failed to write claim audit log: {}", e);
            }

            let response = ClaimResponse {
                success: true,
                message: msg::ORDER_CLAIMED.to_string(),
                products: Some(success.products),
                download_links: Some(success.download_links),
                claim_count: Some(success.claim_count),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> Result<Json<ClaimRequest>, JsonRejection> {
        Ok(Json(serde_json::from_str(json).unwrap()))
    }

    #[test]
    fn accepts_both_field_spellings() {
        assert_eq!(parse_order_identifier(body(r#"{"orderId": "ABC123"}"#)).unwrap(), "ABC123");
        assert_eq!(parse_order_identifier(body(r#"{"order_id": " ABC123 "}"#)).unwrap(), "ABC123");
    }

    #[test]
    fn rejects_missing_and_malformed_ids() {
        assert_eq!(
            parse_order_identifier(body("{}")).unwrap_err(),
            msg::ORDER_ID_REQUIRED
        );
        assert_eq!(
            parse_order_identifier(body(r#"{"orderId": "  "}"#)).unwrap_err(),
            msg::ORDER_ID_REQUIRED
        );
        assert_eq!(
            parse_order_identifier(body(r#"{"orderId": "a;b"}"#)).unwrap_err(),
            msg::ORDER_ID_INVALID
        );
    }

    #[test]
    fn failure_body_has_no_links() {
        let json = serde_json::to_value(ClaimResponse::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "message": "nope" }));
    }
}
