//! Note lookups.

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::NoteRef;

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Get a note's TTL metadata by external id.
pub fn get_by_douban_id(conn: &Connection, douban_id: i64) -> Result<Option<NoteRef>> {
    match conn.query_row(
        "SELECT id, douban_id, updated_at FROM note WHERE douban_id = ?1",
        [douban_id],
        NoteRef::from_row,
    ) {
        Ok(note) => Ok(Some(note)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::tables;
    use crate::upsert::apply;
    use crate::Fields;

    #[test]
    fn lookup_roundtrip() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        apply(
            &conn,
            &tables::NOTE,
            &Fields::new()
                .with("douban_id", 55i64)
                .with("title", "diary".to_string()),
        )
        .unwrap();

        assert!(get_by_douban_id(&conn, 55).unwrap().is_some());
        assert!(get_by_douban_id(&conn, 56).unwrap().is_none());
    }
}
