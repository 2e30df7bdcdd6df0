//! Subject lookups (book / movie / music), shared via [`SubjectRef`].

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::SubjectRef;
use crate::tables::TableSpec;

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Get a subject by external id from the spec's table.
pub fn get_by_douban_id(
    conn: &Connection,
    spec: &TableSpec,
    douban_id: i64,
) -> Result<Option<SubjectRef>> {
    let q = format!(
        "SELECT id, douban_id, updated_at FROM {} WHERE douban_id = ?1",
        spec.table
    );
    match conn.query_row(&q, [douban_id], SubjectRef::from_row) {
        Ok(subject) => Ok(Some(subject)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}
