//! SQLite connection pool and schema.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool. The connection returns to the pool
/// when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Idempotent schema setup.
pub fn migrate_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            chat_id    INTEGER NOT NULL,
            channel_id TEXT    NOT NULL,
            created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (chat_id, channel_id)
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON subscriptions(channel_id);

        CREATE TABLE IF NOT EXISTS destinations (
            channel_id TEXT    NOT NULL,
            chat_id    INTEGER NOT NULL,
            created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (channel_id, chat_id)
        );

        CREATE TABLE IF NOT EXISTS live_state (
            channel_id       TEXT PRIMARY KEY,
            last_video_id    TEXT,
            last_notified_at TEXT,
            cooldown_until   TEXT
        );",
    )
}
