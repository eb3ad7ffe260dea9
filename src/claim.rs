//! Claim engine: turns an order identifier into download links, at most as
//! often as the order's policy allows.
//!
//! A claim runs inside one IMMEDIATE transaction. The write is a conditional
//! UPDATE that re-checks eligibility in its WHERE clause, so concurrent
//! claims on the same one-time order cannot both succeed. When the UPDATE
//! touches no row the snapshot read at the start of the transaction decides
//! which rejection to report, and nothing is written.
//!
//! The engine does not log. Callers decide how to report each outcome.

use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use strum::AsRefStr;

use crate::clock::Clock;
use crate::db::queries;
use crate::error::{Result, msg};
use crate::models::{ClaimedProduct, Order, OrderStatus};

/// Why a claim was refused. None of these mutate the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimRejection {
    NotFound,
    Expired,
    AlreadyClaimed,
    NoProducts,
}

impl ClaimRejection {
    /// Buyer-facing reason. Each rejection has its own message.
    pub fn message(&self) -> &'static str {
        match self {
            ClaimRejection::NotFound => msg::ORDER_NOT_FOUND,
            ClaimRejection::Expired => msg::ORDER_EXPIRED,
            ClaimRejection::AlreadyClaimed => msg::ORDER_ALREADY_CLAIMED,
            ClaimRejection::NoProducts => msg::ORDER_NO_PRODUCTS,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClaimRejection::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Classify a refused conditional update from the order snapshot.
    /// Expiration wins over every other reason.
    fn classify(order: &Order, has_products: bool, now: i64) -> Self {
        if order.is_expired_at(now) {
            ClaimRejection::Expired
        } else if order.one_time_use && order.claim_count >= 1 {
            ClaimRejection::AlreadyClaimed
        } else if !has_products {
            ClaimRejection::NoProducts
        } else {
            // The snapshot and the conditional update run in the same
            // IMMEDIATE transaction, so they agree. Report the terminal
            // state rather than inventing a new outcome.
            ClaimRejection::AlreadyClaimed
        }
    }
}

/// A successful claim. `download_links[i]` belongs to `products[i]`.
#[derive(Debug, Clone)]
pub struct ClaimSuccess {
    /// Internal id of the claimed order.
    pub order_id: i64,
    pub products: Vec<ClaimedProduct>,
    pub download_links: Vec<String>,
    /// Claim count after this claim.
    pub claim_count: i64,
    pub status: OrderStatus,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Success(ClaimSuccess),
    Rejected(ClaimRejection),
}

impl ClaimOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClaimOutcome::Success(_))
    }

    pub fn rejection(&self) -> Option<ClaimRejection> {
        match self {
            ClaimOutcome::Rejected(r) => Some(*r),
            ClaimOutcome::Success(_) => None,
        }
    }
}

/// Attempt to redeem `order_identifier` at `clock.now()`.
///
/// Unknown identifiers are an ordinary `NotFound` outcome. Only storage
/// failures are returned as errors, and a failed attempt never leaves a
/// partial increment behind.
pub fn attempt_claim(
    conn: &mut Connection,
    clock: &dyn Clock,
    order_identifier: &str,
) -> Result<ClaimOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = clock.now();

    let Some(order) = queries::find_order_by_identifier(&tx, order_identifier)? else {
        return Ok(ClaimOutcome::Rejected(ClaimRejection::NotFound));
    };

    let Some(claim_count) = queries::increment_claim(&tx, order.id, now)? else {
        let has_products = !queries::list_order_product_ids(&tx, order.id)?.is_empty();
        // Dropping the transaction rolls back; nothing was written.
        return Ok(ClaimOutcome::Rejected(ClaimRejection::classify(
            &order,
            has_products,
            now,
        )));
    };

    let products = queries::list_order_products(&tx, order.id)?;
    tx.commit()?;

    Ok(ClaimOutcome::Success(ClaimSuccess {
        order_id: order.id,
        download_links: products.iter().map(|p| p.download_link.clone()).collect(),
        products: products.iter().map(ClaimedProduct::from).collect(),
        claim_count,
        status: OrderStatus::derive(order.one_time_use, claim_count),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(one_time_use: bool, claim_count: i64, expires_at: Option<i64>) -> Order {
        Order {
            id: 1,
            order_id: "ABC123".into(),
            expires_at,
            one_time_use,
            claim_count,
            last_claimed_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn expiration_is_checked_first() {
        let o = order(true, 1, Some(10));
        assert_eq!(ClaimRejection::classify(&o, false, 11), ClaimRejection::Expired);
    }

    #[test]
    fn one_time_use_is_checked_before_products() {
        let o = order(true, 1, None);
        assert_eq!(
            ClaimRejection::classify(&o, false, 0),
            ClaimRejection::AlreadyClaimed
        );
        let o = order(false, 5, None);
        assert_eq!(ClaimRejection::classify(&o, false, 0), ClaimRejection::NoProducts);
    }

    #[test]
    fn rejections_have_distinct_messages_and_statuses() {
        let all = [
            ClaimRejection::NotFound,
            ClaimRejection::Expired,
            ClaimRejection::AlreadyClaimed,
            ClaimRejection::NoProducts,
        ];
        let messages: std::collections::HashSet<_> = all.iter().map(|r| r.message()).collect();
        assert_eq!(messages.len(), all.len());
        assert_eq!(ClaimRejection::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ClaimRejection::Expired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ClaimRejection::AlreadyClaimed.as_ref(), "ALREADY_CLAIMED");
    }
}
