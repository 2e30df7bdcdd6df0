//! The settings KV store.
//!
//! Values are stored as text; typed getters parse on the way out and
//! fall back to the caller's default on absence or a malformed value.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use gy_core::settings as keys;
use gy_core::{Error, Result, WorkerSettings};

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Raw string getter.
pub fn get_string(conn: &Connection, name: &str) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM setting WHERE name = ?1",
        [name],
        |row| row.get(0),
    ) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Set (or replace) a setting.
pub fn set_string(conn: &Connection, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO setting (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        rusqlite::params![name, value],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Integer getter with default.
pub fn get_i64(conn: &Connection, name: &str, default: i64) -> Result<i64> {
    Ok(get_string(conn, name)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(default))
}

/// Boolean getter with default; stored as "0"/"1".
pub fn get_bool(conn: &Connection, name: &str, default: bool) -> Result<bool> {
    Ok(get_string(conn, name)?
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default))
}

/// JSON getter with default.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, name: &str, default: T) -> Result<T> {
    Ok(get_string(conn, name)?
        .and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or(default))
}

/// JSON setter.
pub fn set_json<T: Serialize>(conn: &Connection, name: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)
        .map_err(|e| Error::Validation(format!("setting {name}: {e}")))?;
    set_string(conn, name, &encoded)
}

/// Read the full worker-settings snapshot, applying defaults for any
/// missing key.
pub fn load_worker_settings(conn: &Connection) -> Result<WorkerSettings> {
    Ok(WorkerSettings {
        requests_per_minute: get_i64(
            conn,
            keys::KEY_REQUESTS_PER_MINUTE,
            keys::DEFAULT_REQUESTS_PER_MINUTE as i64,
        )? as u32,
        local_object_duration: get_i64(
            conn,
            keys::KEY_LOCAL_OBJECT_DURATION,
            keys::DEFAULT_LOCAL_OBJECT_DURATION,
        )?,
        broadcast_active_duration: get_i64(
            conn,
            keys::KEY_BROADCAST_ACTIVE_DURATION,
            keys::DEFAULT_BROADCAST_ACTIVE_DURATION,
        )?,
        broadcast_incremental_backup: get_bool(
            conn,
            keys::KEY_BROADCAST_INCREMENTAL_BACKUP,
            false,
        )?,
        image_local_cache: get_bool(conn, keys::KEY_IMAGE_LOCAL_CACHE, false)?,
        proxies: get_json(conn, keys::KEY_PROXIES, Vec::new())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn string_roundtrip_and_replace() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert!(get_string(&conn, "k").unwrap().is_none());
        set_string(&conn, "k", "v1").unwrap();
        set_string(&conn, "k", "v2").unwrap();
        assert_eq!(get_string(&conn, "k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn typed_getters_fall_back() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        assert_eq!(get_i64(&conn, "missing", 42).unwrap(), 42);
        set_string(&conn, "n", "not a number").unwrap();
        assert_eq!(get_i64(&conn, "n", 42).unwrap(), 42);
        assert!(get_bool(&conn, "missing", true).unwrap());
    }

    #[test]
    fn worker_settings_snapshot() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let defaults = load_worker_settings(&conn).unwrap();
        assert_eq!(defaults, WorkerSettings::default());

        set_string(&conn, keys::KEY_REQUESTS_PER_MINUTE, "120").unwrap();
        set_string(&conn, keys::KEY_BROADCAST_INCREMENTAL_BACKUP, "1").unwrap();
        set_json(
            &conn,
            keys::KEY_PROXIES,
            &vec!["http://127.0.0.1:8118".to_string()],
        )
        .unwrap();

        let settings = load_worker_settings(&conn).unwrap();
        assert_eq!(settings.requests_per_minute, 120);
        assert!(settings.broadcast_incremental_backup);
        assert_eq!(settings.proxies, vec!["http://127.0.0.1:8118".to_string()]);
    }
}
