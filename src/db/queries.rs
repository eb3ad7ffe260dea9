use rusqlite::{Connection, OptionalExtension, ToSql, TransactionBehavior, params, types::Value};
use uuid::Uuid;

use crate::clock::expires_after_days;
use crate::crypto::{generate_api_key, hash_secret};
use crate::error::{AppError, Result, msg};
use crate::models::*;

use super::from_row::{
    ADMIN_COLS, AUDIT_LOG_COLS, FromRow, ORDER_COLS, PRODUCT_COLS, PRODUCT_COLS_P, query_all,
    query_one,
};

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: i64,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Some(v) = set to v, None = set to NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// Execute the update and return the updated row via RETURNING.
    /// With no fields to change, the current row is returned unchanged.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
        now: i64,
    ) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return query_one(
                conn,
                &format!("SELECT {} FROM {} WHERE id = ?1", returning_cols, self.table),
                &[&self.id],
            );
        }
        self.fields.push(("updated_at", now.into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

fn as_sql_params(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

// ============ Policy Settings ============

fn get_setting<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn put_setting<T: serde::Serialize>(conn: &Connection, key: &str, value: &T, now: i64) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, raw, now],
    )?;
    Ok(())
}

/// Current policy defaults. Unset keys fall back to `PolicySettings::default()`.
pub fn get_policy_settings(conn: &Connection) -> Result<PolicySettings> {
    let defaults = PolicySettings::default();
    let default_expiration_days: Option<Option<i32>> =
        get_setting(conn, SETTING_DEFAULT_EXPIRATION_DAYS)?;
    let default_one_time_use: Option<bool> = get_setting(conn, SETTING_DEFAULT_ONE_TIME_USE)?;
    Ok(PolicySettings {
        default_expiration_days: default_expiration_days
            .unwrap_or(defaults.default_expiration_days),
        default_one_time_use: default_one_time_use.unwrap_or(defaults.default_one_time_use),
    })
}

/// Apply a partial update to the policy defaults and return the result.
/// Existing orders are never touched.
pub fn update_policy_settings(
    conn: &mut Connection,
    input: &UpdateSettings,
    now: i64,
) -> Result<PolicySettings> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let next = input.apply(get_policy_settings(&tx)?);
    put_setting(&tx, SETTING_DEFAULT_EXPIRATION_DAYS, &next.default_expiration_days, now)?;
    put_setting(&tx, SETTING_DEFAULT_ONE_TIME_USE, &next.default_one_time_use, now)?;
    tx.commit()?;
    Ok(next)
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct, now: i64) -> Result<Product> {
    let name = input.name.trim().to_string();
    let download_link = input.download_link.trim().to_string();

    conn.execute(
        "INSERT INTO products (name, description, download_link, image_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&name, &input.description, &download_link, &input.image_url, now],
    )?;

    Ok(Product {
        id: conn.last_insert_rowid(),
        name,
        description: input.description.clone(),
        download_link,
        image_url: input.image_url.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: i64) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn list_products_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Product>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;

    let products = query_all(
        conn,
        &format!(
            "SELECT {} FROM products ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            PRODUCT_COLS
        ),
        params![limit, offset],
    )?;

    Ok((products, total))
}

/// Update a product. Returns the updated product, or None if not found.
pub fn update_product(
    conn: &Connection,
    id: i64,
    input: &UpdateProduct,
    now: i64,
) -> Result<Option<Product>> {
    let mut builder = UpdateBuilder::new("products", id)
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_opt(
            "download_link",
            input.download_link.as_ref().map(|l| l.trim().to_string()),
        );

    if let Some(ref description) = input.description {
        builder = builder.set_nullable("description", description.clone());
    }
    if let Some(ref image_url) = input.image_url {
        builder = builder.set_nullable("image_url", image_url.clone());
    }

    builder.execute_returning(conn, PRODUCT_COLS, now)
}

pub fn count_orders_for_product(conn: &Connection, product_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM order_products WHERE product_id = ?1",
        params![product_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete a product. Refused with `Conflict` while any order still bundles it,
/// so an order can never silently lose its download links.
pub fn delete_product(conn: &mut Connection, id: i64) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if count_orders_for_product(&tx, id)? > 0 {
        return Err(AppError::Conflict(msg::PRODUCT_IN_USE.into()));
    }

    let deleted = tx.execute("DELETE FROM products WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

/// Fails with `BadRequest` naming the first id that has no product.
fn ensure_products_exist(conn: &Connection, ids: &[i64]) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM products WHERE id = ?1")?;
    for id in ids {
        if !stmt.exists(params![id])? {
            return Err(AppError::BadRequest(format!("Product {} does not exist", id)));
        }
    }
    Ok(())
}

// ============ Order Ledger ============

/// Look up an order by its external identifier.
pub fn find_order_by_identifier(conn: &Connection, order_identifier: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_id = ?1", ORDER_COLS),
        &[&order_identifier],
    )
}

pub fn get_order_by_id(conn: &Connection, id: i64) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

/// Products bundled with an order, in the order the admin listed them.
pub fn list_order_products(conn: &Connection, order_id: i64) -> Result<Vec<Product>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_products op
             JOIN products p ON p.id = op.product_id
             WHERE op.order_id = ?1
             ORDER BY op.position",
            PRODUCT_COLS_P
        ),
        &[&order_id],
    )
}

pub fn list_order_product_ids(conn: &Connection, order_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT product_id FROM order_products WHERE order_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map(params![order_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Conditionally record one successful claim.
///
/// The WHERE clause re-checks the full eligibility predicate (not expired,
/// not an exhausted one-time order, has products), so the row only changes if
/// the order is still claimable at the moment of the write. Returns the new
/// claim count, or None when nothing was updated.
pub fn increment_claim(conn: &Connection, order_id: i64, now: i64) -> Result<Option<i64>> {
    conn.query_row(
        "UPDATE orders
         SET claim_count = claim_count + 1, last_claimed_at = ?2, updated_at = ?2
         WHERE id = ?1
           AND (expires_at IS NULL OR expires_at >= ?2)
           AND (one_time_use = 0 OR claim_count = 0)
           AND EXISTS (SELECT 1 FROM order_products WHERE order_id = orders.id)
         RETURNING claim_count",
        params![order_id, now],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn insert_order_products(conn: &Connection, order_id: i64, product_ids: &[i64]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO order_products (order_id, product_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, product_id) in product_ids.iter().enumerate() {
        stmt.execute(params![order_id, product_id, position as i64])?;
    }
    Ok(())
}

/// Create an order, filling unspecified policy fields from the current
/// defaults. The defaults are copied into the row; later settings changes do
/// not reach existing orders.
pub fn create_order(conn: &mut Connection, input: &CreateOrder, now: i64) -> Result<Order> {
    let order_identifier = input.order_id.trim().to_string();
    let product_ids = dedup_product_ids(&input.product_ids);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if find_order_by_identifier(&tx, &order_identifier)?.is_some() {
        return Err(AppError::Conflict(msg::ORDER_ID_TAKEN.into()));
    }
    ensure_products_exist(&tx, &product_ids)?;

    let defaults = get_policy_settings(&tx)?;
    let expiration_days = input.expiration_days.or(defaults.default_expiration_days);
    let expires_at = expiration_days.map(|days| expires_after_days(now, days));
    let one_time_use = input.one_time_use.unwrap_or(defaults.default_one_time_use);

    tx.execute(
        "INSERT INTO orders (order_id, expires_at, one_time_use, claim_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
        params![&order_identifier, expires_at, one_time_use, now],
    )?;
    let id = tx.last_insert_rowid();

    insert_order_products(&tx, id, &product_ids)?;
    tx.commit()?;

    Ok(Order {
        id,
        order_id: order_identifier,
        expires_at,
        one_time_use,
        claim_count: 0,
        last_claimed_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Apply an admin edit to an order in one IMMEDIATE transaction.
///
/// Policy fields, the optional claim-count reset and the product-set
/// replacement commit together, so a concurrent claim sees either the old
/// order or the new one and never an order with no products. The reset only
/// fires when the stored flag is currently multi-use and the edit turns it
/// one-time; `reset_on_flip` supplies the default when the edit does not say.
pub fn update_order(
    conn: &mut Connection,
    input: &UpdateOrder,
    reset_on_flip: bool,
    now: i64,
) -> Result<Option<Order>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if get_order_by_id(&tx, input.id)?.is_none() {
        return Ok(None);
    }

    let product_ids = input.product_ids.as_deref().map(dedup_product_ids);
    if let Some(ref ids) = product_ids {
        ensure_products_exist(&tx, ids)?;
    }

    let (set_expiry, expires_at) = match (input.expiration_days, input.expires_at) {
        (Some(days), _) => (true, Some(expires_after_days(now, days))),
        (None, Some(at)) => (true, at),
        (None, None) => (false, None),
    };
    let reset = input.reset_claim_count.unwrap_or(reset_on_flip);

    let order = tx.query_row(
        &format!(
            "UPDATE orders SET
                claim_count = CASE WHEN ?2 = 1 AND one_time_use = 0 AND ?3 = 1 THEN 0 ELSE claim_count END,
                one_time_use = COALESCE(?3, one_time_use),
                expires_at = CASE WHEN ?4 = 1 THEN ?5 ELSE expires_at END,
                updated_at = ?6
             WHERE id = ?1
             RETURNING {}",
            ORDER_COLS
        ),
        params![input.id, reset, input.one_time_use, set_expiry, expires_at, now],
        Order::from_row,
    )?;

    if let Some(ref ids) = product_ids {
        tx.execute("DELETE FROM order_products WHERE order_id = ?1", params![input.id])?;
        insert_order_products(&tx, input.id, ids)?;
    }

    tx.commit()?;
    Ok(Some(order))
}

/// Delete an order together with its product associations.
pub fn delete_order(conn: &mut Connection, id: i64) -> Result<bool> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM order_products WHERE order_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

pub fn list_orders_paginated(
    conn: &Connection,
    status: Option<OrderStatus>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64)> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    match status {
        Some(OrderStatus::Claimed) => conditions.push("(one_time_use = 1 AND claim_count > 0)"),
        Some(OrderStatus::Available) => {
            conditions.push("NOT (one_time_use = 1 AND claim_count > 0)")
        }
        None => {}
    }
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("order_id LIKE '%' || ? || '%'");
        values.push(search.to_string().into());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM orders {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let orders = query_all(
        conn,
        &format!(
            "SELECT {} FROM orders {} ORDER BY id DESC LIMIT ? OFFSET ?",
            ORDER_COLS, where_clause
        ),
        &as_sql_params(&values),
    )?;

    Ok((orders, total))
}

// ============ Admins ============

/// Create an admin. Returns the admin and the plaintext API key, which is not
/// recoverable afterwards.
pub fn create_admin(conn: &Connection, input: &CreateAdmin, now: i64) -> Result<(Admin, String)> {
    let username = input.username.trim().to_string();

    let exists = conn
        .prepare_cached("SELECT 1 FROM admins WHERE username = ?1")?
        .exists(params![&username])?;
    if exists {
        return Err(AppError::Conflict(msg::USERNAME_TAKEN.into()));
    }

    let api_key = generate_api_key();
    conn.execute(
        "INSERT INTO admins (username, api_key_hash, created_at) VALUES (?1, ?2, ?3)",
        params![&username, hash_secret(&api_key), now],
    )?;

    Ok((
        Admin {
            id: conn.last_insert_rowid(),
            username,
            created_at: now,
            last_used_at: None,
        },
        api_key,
    ))
}

/// Resolve an admin from a plaintext API key and stamp `last_used_at`.
pub fn get_admin_by_api_key(conn: &Connection, api_key: &str, now: i64) -> Result<Option<Admin>> {
    let admin: Option<Admin> = query_one(
        conn,
        &format!("SELECT {} FROM admins WHERE api_key_hash = ?1", ADMIN_COLS),
        &[&hash_secret(api_key)],
    )?;

    if let Some(ref admin) = admin {
        // Best effort; a failed stamp must not fail authentication.
        let _ = conn.execute(
            "UPDATE admins SET last_used_at = ?1 WHERE id = ?2",
            params![now, admin.id],
        );
    }

    Ok(admin)
}

pub fn get_admin_by_id(conn: &Connection, id: i64) -> Result<Option<Admin>> {
    query_one(
        conn,
        &format!("SELECT {} FROM admins WHERE id = ?1", ADMIN_COLS),
        &[&id],
    )
}

pub fn list_admins(conn: &Connection) -> Result<Vec<Admin>> {
    query_all(
        conn,
        &format!("SELECT {} FROM admins ORDER BY id", ADMIN_COLS),
        &[],
    )
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))?;
    Ok(count)
}

/// Delete an admin on behalf of `acting_admin_id`. Admins cannot delete
/// themselves, and the last remaining admin cannot be deleted.
pub fn delete_admin(conn: &mut Connection, id: i64, acting_admin_id: i64) -> Result<bool> {
    if id == acting_admin_id {
        return Err(AppError::Forbidden(msg::CANNOT_DELETE_SELF.into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if get_admin_by_id(&tx, id)?.is_none() {
        return Ok(false);
    }
    if count_admins(&tx)? <= 1 {
        return Err(AppError::Conflict(msg::CANNOT_DELETE_LAST_ADMIN.into()));
    }
    let deleted = tx.execute("DELETE FROM admins WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ============ Audit Logs ============

#[allow(clippy::too_many_arguments)]
pub fn create_audit_log(
    conn: &Connection,
    enabled: bool,
    timestamp: i64,
    actor_type: ActorType,
    actor_id: Option<i64>,
    actor_name: Option<&str>,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AuditLog> {
    let log = AuditLog {
        id: gen_id(),
        timestamp,
        actor_type,
        actor_id,
        actor_name: actor_name.map(String::from),
        action: action.to_string(),
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        details: details.cloned(),
        ip_address: ip_address.map(String::from),
        user_agent: user_agent.map(String::from),
    };

    // Skip database insert if audit logging is disabled
    if !enabled {
        return Ok(log);
    }

    conn.execute(
        "INSERT INTO audit_logs (id, timestamp, actor_type, actor_id, actor_name, action, resource_type, resource_id, details, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &log.id,
            log.timestamp,
            log.actor_type.as_ref(),
            log.actor_id,
            &log.actor_name,
            &log.action,
            &log.resource_type,
            &log.resource_id,
            details.map(|d| d.to_string()),
            &log.ip_address,
            &log.user_agent
        ],
    )?;

    Ok(log)
}

pub fn query_audit_logs(conn: &Connection, query: &AuditLogQuery) -> Result<(Vec<AuditLog>, i64)> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(ref action) = query.action {
        conditions.push("action = ?");
        values.push(action.clone().into());
    }
    if let Some(ref resource_type) = query.resource_type {
        conditions.push("resource_type = ?");
        values.push(resource_type.clone().into());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_logs {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let pagination = query.pagination();
    values.push(pagination.limit().into());
    values.push(pagination.offset().into());
    let logs = query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs {} ORDER BY timestamp DESC, rowid DESC LIMIT ? OFFSET ?",
            AUDIT_LOG_COLS, where_clause
        ),
        &as_sql_params(&values),
    )?;

    Ok((logs, total))
}

// ============ Stats ============

pub fn get_dashboard_stats(conn: &Connection) -> Result<DashboardStats> {
    let stats = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM products),
            (SELECT COUNT(*) FROM orders),
            (SELECT COUNT(*) FROM orders WHERE one_time_use = 1 AND claim_count > 0),
            (SELECT COALESCE(SUM(claim_count), 0) FROM orders)",
        [],
        |row| {
            Ok(DashboardStats {
                products: row.get(0)?,
                orders: row.get(1)?,
                claimed_orders: row.get(2)?,
                total_claims: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}
