//! User lookups. Writes go through the upsert protocol
//! (`upsert::apply` with [`crate::tables::USER`]).

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::User;

const COLS: &str = "id, douban_id, unique_name, name, created, loc_name, signature,
    description, avatar, large_avatar, alt, kind, version, updated_at";

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Get a user by row id.
pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM user WHERE id = ?1");
    match conn.query_row(&q, [id], User::from_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Get a user by external id.
pub fn get_by_douban_id(conn: &Connection, douban_id: i64) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM user WHERE douban_id = ?1");
    match conn.query_row(&q, [douban_id], User::from_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Get a user by unique name (the profile-URL segment).
pub fn get_by_unique_name(conn: &Connection, unique_name: &str) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM user WHERE unique_name = ?1");
    match conn.query_row(&q, [unique_name], User::from_row) {
        Ok(user) => Ok(Some(user)),
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
    fn lookup_by_both_natural_keys() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let fields = Fields::new()
            .with("douban_id", 100i64)
            .with("unique_name", "alice".to_string())
            .with("name", "Alice".to_string());
        let applied = apply(&conn, &tables::USER, &fields).unwrap();

        let by_id = get_by_douban_id(&conn, 100).unwrap().unwrap();
        let by_name = get_by_unique_name(&conn, "alice").unwrap().unwrap();
        assert_eq!(by_id.id, applied.id());
        assert_eq!(by_name.id, applied.id());
        assert_eq!(by_id.name.as_deref(), Some("Alice"));
        assert!(get_by_unique_name(&conn, "nobody").unwrap().is_none());
    }
}
