use serde::Serialize;

/// Counters for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub products: i64,
    pub orders: i64,
    /// One-time orders that have been redeemed.
    pub claimed_orders: i64,
    /// Successful claims across all orders.
    pub total_claims: i64,
}
