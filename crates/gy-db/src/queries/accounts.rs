//! Account operations.
//!
//! At most one account is activated at a time; the activated account with
//! a bound user is the default account backups run under.

use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::models::Account;
use crate::now_ts;

const COLS: &str = "id, name, user_id, session, is_activated, is_invalid, created_at";

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

/// Create an account from a profile name and a session cookie string.
/// The first account ever created is activated automatically.
pub fn create_account(conn: &Connection, name: &str, session: &str) -> Result<Account> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))
        .map_err(db_err)?;
    let activate = existing == 0;

    conn.execute(
        "INSERT INTO account (name, session, is_activated, is_invalid, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)",
        rusqlite::params![name, session, activate, now_ts()],
    )
    .map_err(db_err)?;

    let id = conn.last_insert_rowid();
    get_account(conn, id)?.ok_or_else(|| Error::not_found("account", id))
}

/// Get an account by id.
pub fn get_account(conn: &Connection, id: i64) -> Result<Option<Account>> {
    let q = format!("SELECT {COLS} FROM account WHERE id = ?1");
    match conn.query_row(&q, [id], Account::from_row) {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// The default account: activated, user bound.
pub fn get_default(conn: &Connection) -> Result<Option<Account>> {
    let q = format!(
        "SELECT {COLS} FROM account WHERE is_activated = 1 AND user_id IS NOT NULL LIMIT 1"
    );
    match conn.query_row(&q, [], Account::from_row) {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// List all accounts.
pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let q = format!("SELECT {COLS} FROM account ORDER BY id");
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([], Account::from_row)
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Activate one account, deactivating every other.
pub fn activate(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE account SET is_activated = 0", [])
        .map_err(db_err)?;
    let n = conn
        .execute(
            "UPDATE account SET is_activated = 1 WHERE id = ?1",
            [id],
        )
        .map_err(db_err)?;
    if n == 0 {
        return Err(Error::not_found("account", id));
    }
    Ok(())
}

/// Flag an account's session as invalid (login wall was hit).
pub fn mark_invalid(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE account SET is_invalid = 1 WHERE id = ?1",
        [id],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Bind the owning user once it has been fetched.
pub fn bind_user(conn: &Connection, id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE account SET user_id = ?1 WHERE id = ?2",
        rusqlite::params![user_id, id],
    )
    .map_err(db_err)?;
    Ok(())
}
