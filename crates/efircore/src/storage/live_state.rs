//! Per-channel notification state: last-notified broadcast id and cooldown.
//!
//! Timestamps are stored as RFC 3339 UTC strings. Readers treat unparsable
//! values as absent; this module only reads and writes the raw strings.

use rusqlite::{params, Connection, OptionalExtension};

/// Last broadcast id the channel was notified for.
pub fn get_last_video(conn: &Connection, channel_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT last_video_id FROM live_state WHERE channel_id = ?1",
        params![channel_id],
        |row| row.get(0),
    )
    .optional()
    .map(Option::flatten)
}

/// Record the newly notified broadcast id and its timestamp in one write.
pub fn set_last_video(
    conn: &Connection,
    channel_id: &str,
    video_id: &str,
    notified_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO live_state (channel_id, last_video_id, last_notified_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(channel_id) DO UPDATE SET
           last_video_id = ?2,
           last_notified_at = ?3",
        params![channel_id, video_id, notified_at],
    )?;
    Ok(())
}

/// Raw cooldown-until timestamp, if any.
pub fn get_cooldown_until(conn: &Connection, channel_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT cooldown_until FROM live_state WHERE channel_id = ?1",
        params![channel_id],
        |row| row.get(0),
    )
    .optional()
    .map(Option::flatten)
}

/// Set the channel's cooldown-until timestamp, preserving the rest of the
/// row.
pub fn set_cooldown_until(conn: &Connection, channel_id: &str, until: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO live_state (channel_id, cooldown_until)
         VALUES (?1, ?2)
         ON CONFLICT(channel_id) DO UPDATE SET cooldown_until = ?2",
        params![channel_id, until],
    )?;
    Ok(())
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
    fn absent_channel_has_no_state() {
        let conn = test_conn();
        assert_eq!(get_last_video(&conn, "UCaaa").unwrap(), None);
        assert_eq!(get_cooldown_until(&conn, "UCaaa").unwrap(), None);
    }

    #[test]
    fn last_video_upserts() {
        let conn = test_conn();
        set_last_video(&conn, "UCaaa", "v1", "2024-05-01T10:00:00+00:00").unwrap();
        assert_eq!(get_last_video(&conn, "UCaaa").unwrap().as_deref(), Some("v1"));

        set_last_video(&conn, "UCaaa", "v2", "2024-05-01T12:00:00+00:00").unwrap();
        assert_eq!(get_last_video(&conn, "UCaaa").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn cooldown_is_independent_of_last_video() {
        let conn = test_conn();
        set_cooldown_until(&conn, "UCaaa", "2024-05-01T11:00:00+00:00").unwrap();
        assert_eq!(
            get_cooldown_until(&conn, "UCaaa").unwrap().as_deref(),
            Some("2024-05-01T11:00:00+00:00")
        );
        // No broadcast recorded yet.
        assert_eq!(get_last_video(&conn, "UCaaa").unwrap(), None);

        // Writing the broadcast later keeps the cooldown.
        set_last_video(&conn, "UCaaa", "v1", "2024-05-01T10:30:00+00:00").unwrap();
        assert_eq!(
            get_cooldown_until(&conn, "UCaaa").unwrap().as_deref(),
            Some("2024-05-01T11:00:00+00:00")
        );
    }
}
