use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};
use crate::pagination::PaginationQuery;

use super::deserialize_optional_nullable;

pub const ORDER_ID_MIN_LEN: usize = 3;
pub const ORDER_ID_MAX_LEN: usize = 50;
pub const EXPIRATION_DAYS_MIN: i32 = 1;
pub const EXPIRATION_DAYS_MAX: i32 = 365;

/// Display status of an order. Never stored; always derived from the
/// one-time-use flag and the claim count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Available,
    Claimed,
}

impl OrderStatus {
    /// Multi-use orders stay `Available` no matter how often they are claimed.
    pub fn derive(one_time_use: bool, claim_count: i64) -> Self {
        if one_time_use && claim_count > 0 {
            OrderStatus::Claimed
        } else {
            OrderStatus::Available
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// External identifier handed to the buyer.
    pub order_id: String,
    /// Unix seconds; None = never expires.
    pub expires_at: Option<i64>,
    pub one_time_use: bool,
    pub claim_count: i64,
    pub last_claimed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::derive(self.one_time_use, self.claim_count)
    }

    /// Expired once `now` is strictly past the deadline.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

/// Admin view of an order with its derived fields and product set.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status: OrderStatus,
    pub expired: bool,
    pub product_ids: Vec<i64>,
}

impl OrderView {
    pub fn new(order: Order, product_ids: Vec<i64>, now: i64) -> Self {
        Self {
            status: order.status(),
            expired: order.is_expired_at(now),
            order,
            product_ids,
        }
    }
}

/// True for 3-50 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_order_identifier(value: &str) -> bool {
    (ORDER_ID_MIN_LEN..=ORDER_ID_MAX_LEN).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_product_ids(ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Err(AppError::BadRequest(msg::PRODUCT_IDS_EMPTY.into()));
    }
    if ids.iter().any(|id| *id <= 0) {
        return Err(AppError::BadRequest(msg::PRODUCT_IDS_INVALID.into()));
    }
    Ok(())
}

fn validate_expiration_days(days: Option<i32>) -> Result<()> {
    if let Some(days) = days
        && !(EXPIRATION_DAYS_MIN..=EXPIRATION_DAYS_MAX).contains(&days)
    {
        return Err(AppError::BadRequest(msg::EXPIRATION_DAYS_RANGE.into()));
    }
    Ok(())
}

/// Drop repeated ids, keeping the first occurrence so positions stay stable.
pub fn dedup_product_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub order_id: String,
    pub product_ids: Vec<i64>,
    /// Falls back to the policy default when absent.
    #[serde(default)]
    pub expiration_days: Option<i32>,
    /// Falls back to the policy default when absent.
    #[serde(default)]
    pub one_time_use: Option<bool>,
}

impl CreateOrder {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_order_identifier(self.order_id.trim()) {
            return Err(AppError::BadRequest(msg::ORDER_ID_INVALID.into()));
        }
        validate_product_ids(&self.product_ids)?;
        validate_expiration_days(self.expiration_days)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrder {
    /// Internal numeric id of the order being edited.
    pub id: i64,
    /// Full replacement of the product set.
    #[serde(default)]
    pub product_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub one_time_use: Option<bool>,
    /// New window counted from the time of the edit.
    #[serde(default)]
    pub expiration_days: Option<i32>,
    /// Absolute deadline; null clears it.
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub expires_at: Option<Option<i64>>,
    /// Overrides the configured reset when flipping multi-use to one-time.
    #[serde(default)]
    pub reset_claim_count: Option<bool>,
}

impl UpdateOrder {
    pub fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(AppError::BadRequest("id must be a positive integer".into()));
        }
        if let Some(ref ids) = self.product_ids {
            validate_product_ids(ids)?;
        }
        validate_expiration_days(self.expiration_days)?;
        if self.expiration_days.is_some() && self.expires_at.is_some() {
            return Err(AppError::BadRequest(
                "Provide either expiration_days or expires_at, not both".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteOrderQuery {
    pub id: i64,
}

/// Filters for the admin order listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Substring match on the external order id.
    #[serde(default)]
    pub search: Option<String>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}
