//! The versioned-with-history upsert protocol and snapshot reconciliation.
//!
//! Every mutation flows through [`apply`]: create the row if its natural
//! key is unseen; otherwise compare the compared attributes, and on any
//! disagreement archive the current row into the historical table, update
//! in place, and bump `version`. Re-applying unchanged data only touches
//! `updated_at`, which is what [`reconcile`] keys on to detect elements
//! that disappeared from a fresh snapshot.

use rusqlite::types::Value;
use rusqlite::Connection;
use gy_core::{Error, Result};

use crate::fields::Fields;
use crate::now_ts;
use crate::tables::TableSpec;

/// Outcome of one [`apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new current row was inserted.
    Created { id: i64 },
    /// The current row disagreed on a compared attribute; it was archived
    /// and updated in place.
    Updated { id: i64, version: i64 },
    /// The fresh data matched the current row; only `updated_at` moved.
    Unchanged { id: i64 },
}

impl Applied {
    /// Row id of the current row, whatever happened to it.
    pub fn id(&self) -> i64 {
        match self {
            Applied::Created { id } | Applied::Updated { id, .. } | Applied::Unchanged { id } => {
                *id
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Applied::Created { .. })
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

fn constraint_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::integrity(e.to_string())
        }
        _ => db_err(e),
    }
}

/// A column is insertable if the spec declares it, or it is one of the
/// bookkeeping columns the protocol manages itself.
fn is_declared(spec: &TableSpec, column: &str) -> bool {
    column == "updated_at"
        || (spec.versioned && column == "version")
        || spec.columns.contains(&column)
}

fn declared_entries<'f>(spec: &TableSpec, fields: &'f Fields) -> Vec<(&'static str, &'f Value)> {
    fields
        .iter()
        .filter(|(c, _)| is_declared(spec, c))
        .map(|(c, v)| (*c, v))
        .collect()
}

// ---------------------------------------------------------------------------
// safe_create / safe_update / clone
// ---------------------------------------------------------------------------

/// Insert a row carrying only declared columns; unknown keys are dropped
/// silently. A unique conflict surfaces as [`Error::Integrity`].
pub fn safe_create(conn: &Connection, spec: &TableSpec, fields: &Fields) -> Result<i64> {
    let entries = declared_entries(spec, fields);
    if entries.is_empty() {
        return Err(Error::Validation(format!(
            "no insertable fields for {}",
            spec.table
        )));
    }

    let columns: Vec<&str> = entries.iter().map(|(c, _)| *c).collect();
    let placeholders: Vec<String> = (1..=entries.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        spec.table,
        columns.join(", "),
        placeholders.join(", ")
    );

    let params = rusqlite::params_from_iter(entries.iter().map(|(_, v)| (*v).clone()));
    conn.execute(&sql, params).map_err(constraint_err)?;
    Ok(conn.last_insert_rowid())
}

/// Update a row in place, with the same column filtering as
/// [`safe_create`].
pub fn safe_update(conn: &Connection, spec: &TableSpec, fields: &Fields, id: i64) -> Result<()> {
    let entries = declared_entries(spec, fields);
    if entries.is_empty() {
        return Ok(());
    }

    let assignments: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, (c, _))| format!("{c} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        spec.table,
        assignments.join(", "),
        entries.len() + 1
    );

    let mut params: Vec<Value> = entries.iter().map(|(_, v)| (*v).clone()).collect();
    params.push(Value::Integer(id));
    conn.execute(&sql, rusqlite::params_from_iter(params))
        .map_err(constraint_err)?;
    Ok(())
}

fn archived_columns(spec: &TableSpec) -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = spec.columns.to_vec();
    if spec.versioned {
        cols.push("version");
    }
    cols.push("updated_at");
    cols
}

/// Copy the current row's data columns into the historical table, with
/// `<origin>_id` pointing back at the current row and the given
/// `deleted_at` stamp.
pub fn clone_into_historical(
    conn: &Connection,
    spec: &TableSpec,
    id: i64,
    deleted_at: &str,
) -> Result<()> {
    let Some(historical) = spec.historical else {
        return Err(Error::internal(format!(
            "{} keeps no history",
            spec.table
        )));
    };

    let cols = archived_columns(spec).join(", ");
    let sql = format!(
        "INSERT INTO {historical} ({cols}, {origin}, deleted_at)
         SELECT {cols}, id, ?1 FROM {table} WHERE id = ?2",
        origin = spec.origin_column,
        table = spec.table,
    );
    let n = conn
        .execute(&sql, rusqlite::params![deleted_at, id])
        .map_err(db_err)?;
    if n == 0 {
        return Err(Error::not_found(spec.table, id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// equality
// ---------------------------------------------------------------------------

/// Compare the current row against fresh fields over the spec's compared
/// attributes, by string conversion. In non-strict mode an attribute
/// absent from `fields` counts as equal; strict mode demands presence.
pub fn row_matches(
    conn: &Connection,
    spec: &TableSpec,
    id: i64,
    fields: &Fields,
    strict: bool,
) -> Result<bool> {
    if spec.compared.is_empty() {
        return Ok(true);
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        spec.compared.join(", "),
        spec.table
    );
    let current: Vec<Value> = conn
        .query_row(&sql, [id], |row| {
            (0..spec.compared.len())
                .map(|i| row.get::<_, Value>(i))
                .collect()
        })
        .map_err(db_err)?;

    for (column, current_value) in spec.compared.iter().zip(current.iter()) {
        let fresh = match fields.get(column) {
            Some(v) => v,
            None if strict => return Ok(false),
            None => continue,
        };
        if Fields::compare_string(fresh) != Fields::compare_string(current_value) {
            return Ok(false);
        }
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn find_by_natural_key(
    conn: &Connection,
    spec: &TableSpec,
    fields: &Fields,
) -> Result<(i64, i64)> {
    let mut clauses = Vec::with_capacity(spec.natural_key.len());
    let mut params: Vec<Value> = Vec::with_capacity(spec.natural_key.len());
    for (i, column) in spec.natural_key.iter().enumerate() {
        let value = fields.get(column).ok_or_else(|| {
            Error::Validation(format!(
                "{}: natural-key column {column} missing from fields",
                spec.table
            ))
        })?;
        clauses.push(format!("{column} = ?{}", i + 1));
        params.push(value.clone());
    }

    let version_expr = if spec.versioned { "version" } else { "1" };
    let sql = format!(
        "SELECT id, {version_expr} FROM {} WHERE {}",
        spec.table,
        clauses.join(" AND ")
    );
    conn.query_row(&sql, rusqlite::params_from_iter(params), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::integrity(format!(
            "{}: conflicting row not reachable via natural key",
            spec.table
        )),
        other => db_err(other),
    })
}

/// Create-or-update-with-history for a single entity.
///
/// Idempotent under re-application of unchanged data, monotone in
/// `version`, and pairing each historical row with the previous state of
/// the current row. Run inside the caller's transaction.
pub fn apply(conn: &Connection, spec: &TableSpec, fields: &Fields) -> Result<Applied> {
    let now = now_ts();

    let mut create_fields = fields.clone();
    if spec.versioned {
        create_fields.set("version", 1i64);
    }
    create_fields.set("updated_at", now.clone());

    match safe_create(conn, spec, &create_fields) {
        Ok(id) => Ok(Applied::Created { id }),
        Err(Error::Integrity(_)) => {
            let (id, version) = find_by_natural_key(conn, spec, fields)?;
            if row_matches(conn, spec, id, fields, false)? {
                conn.execute(
                    &format!("UPDATE {} SET updated_at = ?1 WHERE id = ?2", spec.table),
                    rusqlite::params![now, id],
                )
                .map_err(db_err)?;
                Ok(Applied::Unchanged { id })
            } else {
                if spec.historical.is_some() {
                    clone_into_historical(conn, spec, id, &now)?;
                }
                let mut update_fields = fields.clone();
                if spec.versioned {
                    update_fields.set("version", version + 1);
                }
                update_fields.set("updated_at", now);
                safe_update(conn, spec, &update_fields, id)?;
                Ok(Applied::Updated {
                    id,
                    version: version + 1,
                })
            }
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Finalize a snapshot: every scoped row whose `updated_at` predates
/// `started_at` was not observed in the fresh snapshot. Archive each such
/// row into the historical table with `deleted_at = now` and delete it.
///
/// Returns the number of rows archived. Run inside the caller's
/// transaction.
pub fn reconcile(
    conn: &Connection,
    spec: &TableSpec,
    scope: &[(&'static str, Value)],
    started_at: &str,
) -> Result<usize> {
    let Some(historical) = spec.historical else {
        return Err(Error::internal(format!(
            "{} keeps no history",
            spec.table
        )));
    };

    let now = now_ts();
    let mut clauses: Vec<String> = Vec::with_capacity(scope.len() + 1);
    let mut params: Vec<Value> = Vec::with_capacity(scope.len() + 2);
    params.push(Value::Text(now));
    for (i, (column, value)) in scope.iter().enumerate() {
        clauses.push(format!("{column} = ?{}", i + 2));
        params.push(value.clone());
    }
    clauses.push(format!("updated_at < ?{}", scope.len() + 2));
    params.push(Value::Text(started_at.to_string()));
    let where_clause = clauses.join(" AND ");

    let cols = archived_columns(spec).join(", ");
    let insert_sql = format!(
        "INSERT INTO {historical} ({cols}, {origin}, deleted_at)
         SELECT {cols}, id, ?1 FROM {table} WHERE {where_clause}",
        origin = spec.origin_column,
        table = spec.table,
    );
    let archived = conn
        .execute(&insert_sql, rusqlite::params_from_iter(params.clone()))
        .map_err(db_err)?;

    // The archive insert and the delete share the same predicate; drop the
    // leading deleted_at parameter and renumber for the delete.
    let mut delete_clauses: Vec<String> = Vec::with_capacity(scope.len() + 1);
    let mut delete_params: Vec<Value> = Vec::with_capacity(scope.len() + 1);
    for (i, (column, value)) in scope.iter().enumerate() {
        delete_clauses.push(format!("{column} = ?{}", i + 1));
        delete_params.push(value.clone());
    }
    delete_clauses.push(format!("updated_at < ?{}", scope.len() + 1));
    delete_params.push(Value::Text(started_at.to_string()));
    let delete_sql = format!(
        "DELETE FROM {} WHERE {}",
        spec.table,
        delete_clauses.join(" AND ")
    );
    let deleted = conn
        .execute(&delete_sql, rusqlite::params_from_iter(delete_params))
        .map_err(db_err)?;

    debug_assert_eq!(archived, deleted);
    Ok(archived)
}

// ---------------------------------------------------------------------------
// atomic
// ---------------------------------------------------------------------------

/// Run `f` as one transaction. An error inside rolls everything back and
/// is reported as [`Error::TxnAborted`].
pub fn atomic<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit().map_err(db_err)?;
            Ok(value)
        }
        Err(e) => Err(Error::TxnAborted(e.to_string())),
    }
}
