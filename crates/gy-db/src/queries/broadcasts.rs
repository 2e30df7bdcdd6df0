//! Broadcast and timeline operations.

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::Broadcast;

const COLS: &str = "id, douban_id, user_id, created, content, blockquote, status_url,
    kind, is_noreply, reshared_id, images, reshared_count, like_count,
    comments_count, version, updated_at";

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Get a broadcast by external id.
pub fn get_by_douban_id(conn: &Connection, douban_id: i64) -> Result<Option<Broadcast>> {
    let q = format!("SELECT {COLS} FROM broadcast WHERE douban_id = ?1");
    match conn.query_row(&q, [douban_id], Broadcast::from_row) {
        Ok(broadcast) => Ok(Some(broadcast)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Broadcasts on a user's timeline created at or after `cutoff`
/// (the comment-backup "active" window).
pub fn active_on_timeline(
    conn: &Connection,
    user_id: i64,
    cutoff: &str,
) -> Result<Vec<Broadcast>> {
    let cols: Vec<String> = COLS
        .split(',')
        .map(|c| format!("b.{}", c.trim()))
        .collect();
    let q = format!(
        "SELECT {} FROM broadcast b
         JOIN timeline t ON t.broadcast_id = b.id
         WHERE t.user_id = ?1 AND b.created >= ?2
         ORDER BY b.created DESC",
        cols.join(", ")
    );
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, cutoff], Broadcast::from_row)
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;
    Ok(rows)
}
