//! Database operations for channel subscriptions and delivery destinations.
//!
//! Subscriptions map a private chat to the channels it follows;
//! destinations map a channel to extra chats (groups, channels) that
//! receive its notifications.

use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// Subscribe a chat to a channel. Idempotent.
pub fn add_subscription(conn: &Connection, chat_id: i64, channel_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO subscriptions (chat_id, channel_id) VALUES (?1, ?2)",
        params![chat_id, channel_id],
    )?;
    Ok(())
}

/// Remove a chat's subscription. Returns whether anything was removed.
pub fn remove_subscription(conn: &Connection, chat_id: i64, channel_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM subscriptions WHERE chat_id = ?1 AND channel_id = ?2",
        params![chat_id, channel_id],
    )?;
    Ok(removed > 0)
}

/// Channels a chat is subscribed to, in subscription order.
pub fn list_subscriptions(conn: &Connection, chat_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id FROM subscriptions WHERE chat_id = ?1 ORDER BY created_at ASC, channel_id ASC",
    )?;
    let rows = stmt.query_map(params![chat_id], |row| row.get(0))?;
    rows.collect()
}

/// All chats subscribed to a channel.
pub fn subscribers_of(conn: &Connection, channel_id: &str) -> rusqlite::Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT chat_id FROM subscriptions WHERE channel_id = ?1")?;
    let rows = stmt.query_map(params![channel_id], |row| row.get(0))?;
    rows.collect()
}

/// Register an extra delivery destination for a channel. Idempotent.
pub fn add_destination(conn: &Connection, channel_id: &str, chat_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO destinations (channel_id, chat_id) VALUES (?1, ?2)",
        params![channel_id, chat_id],
    )?;
    Ok(())
}

/// Remove one destination. Returns whether anything was removed.
pub fn remove_destination(conn: &Connection, channel_id: &str, chat_id: i64) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM destinations WHERE channel_id = ?1 AND chat_id = ?2",
        params![channel_id, chat_id],
    )?;
    Ok(removed > 0)
}

/// Drop every destination registered for a channel.
pub fn clear_destinations(conn: &Connection, channel_id: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM destinations WHERE channel_id = ?1", params![channel_id])?;
    Ok(())
}

/// Destinations registered for a channel.
pub fn destinations_of(conn: &Connection, channel_id: &str) -> rusqlite::Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT chat_id FROM destinations WHERE channel_id = ?1")?;
    let rows = stmt.query_map(params![channel_id], |row| row.get(0))?;
    rows.collect()
}

/// Every channel referenced by any subscription or destination mapping.
pub fn tracked_channels(conn: &Connection) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id FROM subscriptions UNION SELECT channel_id FROM destinations",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::migrate_schema;
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn subscribe_and_list() {
        let conn = test_conn();
        add_subscription(&conn, 100, "UCaaa").unwrap();
        add_subscription(&conn, 100, "UCbbb").unwrap();
        add_subscription(&conn, 100, "UCaaa").unwrap(); // idempotent

        assert_eq!(list_subscriptions(&conn, 100).unwrap(), vec!["UCaaa", "UCbbb"]);
    }

    #[test]
    fn remove_subscription_reports_whether_it_existed() {
        let conn = test_conn();
        add_subscription(&conn, 100, "UCaaa").unwrap();

        assert!(remove_subscription(&conn, 100, "UCaaa").unwrap());
        assert!(!remove_subscription(&conn, 100, "UCaaa").unwrap());
        assert!(list_subscriptions(&conn, 100).unwrap().is_empty());
    }

    #[test]
    fn subscribers_union_across_chats() {
        let conn = test_conn();
        add_subscription(&conn, 100, "UCaaa").unwrap();
        add_subscription(&conn, 200, "UCaaa").unwrap();
        add_subscription(&conn, 300, "UCbbb").unwrap();

        let subs = subscribers_of(&conn, "UCaaa").unwrap();
        assert_eq!(subs.into_iter().collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn destinations_roundtrip() {
        let conn = test_conn();
        add_destination(&conn, "UCaaa", -1001).unwrap();
        add_destination(&conn, "UCaaa", -1002).unwrap();

        let dests = destinations_of(&conn, "UCaaa").unwrap();
        assert_eq!(dests.len(), 2);

        assert!(remove_destination(&conn, "UCaaa", -1001).unwrap());
        clear_destinations(&conn, "UCaaa").unwrap();
        assert!(destinations_of(&conn, "UCaaa").unwrap().is_empty());
    }

    #[test]
    fn tracked_channels_unions_subscriptions_and_destinations() {
        let conn = test_conn();
        add_subscription(&conn, 100, "UCaaa").unwrap();
        add_destination(&conn, "UCbbb", -1001).unwrap();
        // Channel present on both sides appears once.
        add_destination(&conn, "UCaaa", -1002).unwrap();

        let tracked = tracked_channels(&conn).unwrap();
        assert_eq!(
            tracked.into_iter().collect::<Vec<_>>(),
            vec!["UCaaa".to_string(), "UCbbb".to_string()]
        );
    }
}
