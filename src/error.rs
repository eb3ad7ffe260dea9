use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing messages shared between handlers and models.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const ORDER_EXPIRED: &str = "This order has expired";
    pub const ORDER_ALREADY_CLAIMED: &str = "This order has already been claimed";
    pub const ORDER_NO_PRODUCTS: &str = "No products are associated with this order";
    pub const ORDER_CLAIMED: &str = "Order claimed successfully";

    pub const ORDER_ID_REQUIRED: &str = "Order ID is required";
    pub const ORDER_ID_INVALID: &str =
        "Order ID must be 3-50 characters of letters, digits, '-' or '_'";
    pub const ORDER_ID_TAKEN: &str = "An order with this order ID already exists";
    pub const PRODUCT_IDS_EMPTY: &str = "At least one product is required";
    pub const PRODUCT_IDS_INVALID: &str = "Product IDs must be positive integers";
    pub const EXPIRATION_DAYS_RANGE: &str = "expiration_days must be between 1 and 365";

    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const NAME_TOO_LONG: &str = "Name must be at most 200 characters";
    pub const DOWNLOAD_LINK_INVALID: &str = "download_link must be an http(s) URL";
    pub const IMAGE_URL_INVALID: &str = "image_url must be an http(s) URL";
    pub const PRODUCT_IN_USE: &str = "Product is still referenced by one or more orders";

    pub const USERNAME_INVALID: &str =
        "Username must be 3-50 characters of letters, digits, '-', '_' or '.'";
    pub const USERNAME_TAKEN: &str = "An admin with this username already exists";
    pub const CANNOT_DELETE_SELF: &str = "You cannot delete your own admin account";
    pub const CANNOT_DELETE_LAST_ADMIN: &str = "Cannot delete the last admin account";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
