mod from_row;
mod schema;
pub mod queries;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::clock::Clock;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Pool for the single SQLite file holding orders, products, settings,
    /// admins and the audit trail.
    pub db: DbPool,
    /// Time source for expiration checks and timestamps.
    pub clock: Arc<dyn Clock>,
    pub audit_log_enabled: bool,
    /// Default for whether a multi-use → one-time edit zeroes the claim count.
    pub reset_claims_on_one_time_flip: bool,
}

impl AppState {
    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

/// Per-connection settings. WAL lets readers proceed during a claim, and the
/// busy timeout makes concurrent IMMEDIATE transactions queue instead of
/// failing with SQLITE_BUSY.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA busy_timeout = 5000;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        "#,
    )
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|conn| configure_connection(conn));
    Pool::builder().max_size(10).build(manager)
}
