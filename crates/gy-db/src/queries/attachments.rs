//! Attachment queue operations.
//!
//! Attachments are unique by source URL. `local` is assigned only after
//! the bytes have been materialized under the cache directory; rows with
//! too many failed downloads are skipped by the realization loop.

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::Attachment;
use crate::now_ts;

const COLS: &str = "id, url, mime_type, local, ref_count, retries, created_at";

/// Downloads are abandoned after this many failures.
const MAX_RETRIES: i64 = 5;

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Register a reference to `url`, creating the row on first sight.
pub fn enqueue(conn: &Connection, url: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO attachment (url, ref_count, created_at) VALUES (?1, 1, ?2)
         ON CONFLICT(url) DO UPDATE SET ref_count = ref_count + 1",
        rusqlite::params![url, now_ts()],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Pick any attachment that still lacks a local file and has retry
/// budget left.
pub fn next_unrealized(conn: &Connection) -> Result<Option<Attachment>> {
    let q = format!(
        "SELECT {COLS} FROM attachment
         WHERE local IS NULL AND retries < ?1
         ORDER BY id LIMIT 1"
    );
    match conn.query_row(&q, [MAX_RETRIES], Attachment::from_row) {
        Ok(attachment) => Ok(Some(attachment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Record a successful materialization.
pub fn set_local(conn: &Connection, id: i64, local: &str, mime_type: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE attachment SET local = ?1, mime_type = ?2 WHERE id = ?3",
        rusqlite::params![local, mime_type, id],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Record a failed download attempt.
pub fn bump_retries(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE attachment SET retries = retries + 1 WHERE id = ?1",
        [id],
    )
    .map_err(db_err)?;
    Ok(())
}
