//! SQLite persistence: subscriptions, destinations and notification state.

pub mod db;
pub mod live_state;
pub mod subscriptions;

pub use db::{create_pool, get_connection, migrate_schema, DbConnection, DbPool};

use crate::core::AppResult;
use crate::watch::{LiveStateStore, SubscriptionStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Pool-backed handle implementing the engine-facing store traits.
#[derive(Clone)]
pub struct Store {
    pool: Arc<DbPool>,
}

impl Store {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }
}

impl SubscriptionStore for Store {
    fn tracked_channels(&self) -> AppResult<BTreeSet<String>> {
        let conn = get_connection(&self.pool)?;
        Ok(subscriptions::tracked_channels(&conn)?)
    }

    fn subscribers_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>> {
        let conn = get_connection(&self.pool)?;
        Ok(subscriptions::subscribers_of(&conn, channel_id)?)
    }

    fn destinations_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>> {
        let conn = get_connection(&self.pool)?;
        Ok(subscriptions::destinations_of(&conn, channel_id)?)
    }
}

impl LiveStateStore for Store {
    fn last_video(&self, channel_id: &str) -> AppResult<Option<String>> {
        let conn = get_connection(&self.pool)?;
        Ok(live_state::get_last_video(&conn, channel_id)?)
    }

    fn set_last_video(&self, channel_id: &str, video_id: &str, at: DateTime<Utc>) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        Ok(live_state::set_last_video(&conn, channel_id, video_id, &at.to_rfc3339())?)
    }

    fn cooldown_until(&self, channel_id: &str) -> AppResult<Option<String>> {
        let conn = get_connection(&self.pool)?;
        Ok(live_state::get_cooldown_until(&conn, channel_id)?)
    }

    fn set_cooldown_until(&self, channel_id: &str, until: DateTime<Utc>) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        Ok(live_state::set_cooldown_until(&conn, channel_id, &until.to_rfc3339())?)
    }
}
