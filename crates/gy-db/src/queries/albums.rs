//! Photo album lookups.

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::PhotoAlbum;

const COLS: &str = "id, douban_id, user_id, title, description, cover, total,
    last_updated, version, updated_at";

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Get an album by external id.
pub fn get_by_douban_id(conn: &Connection, douban_id: i64) -> Result<Option<PhotoAlbum>> {
    let q = format!("SELECT {COLS} FROM photo_album WHERE douban_id = ?1");
    match conn.query_row(&q, [douban_id], PhotoAlbum::from_row) {
        Ok(album) => Ok(Some(album)),
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
    fn lookup_carries_last_updated() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        apply(
            &conn,
            &tables::PHOTO_ALBUM,
            &Fields::new()
                .with("douban_id", 9i64)
                .with("title", "trip".to_string())
                .with("last_updated", "2024-05-01".to_string()),
        )
        .unwrap();

        let album = get_by_douban_id(&conn, 9).unwrap().unwrap();
        assert_eq!(album.last_updated.as_deref(), Some("2024-05-01"));
    }
}
