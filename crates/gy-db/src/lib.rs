//! gy-db: the archive store.
//!
//! SQLite-backed persistence for the backup engine: connection pooling,
//! embedded schema migrations, row models, the versioned-with-history
//! upsert protocol, and per-entity query operations.

pub mod fields;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod tables;
pub mod upsert;

pub use fields::Fields;
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
pub use tables::TableSpec;
pub use upsert::{apply, atomic, reconcile, Applied};

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time as the canonical stored timestamp format
/// (RFC 3339, microsecond precision, `Z` suffix). The fixed width keeps
/// lexicographic ordering consistent with chronological ordering, which
/// the reconciliation step relies on.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
pub fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_roundtrip() {
        let ts = now_ts();
        let parsed = parse_ts(&ts).unwrap();
        assert_eq!(
            parsed.to_rfc3339_opts(SecondsFormat::Micros, true),
            ts
        );
    }

    #[test]
    fn timestamps_order_lexicographically() {
        let a = now_ts();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_ts();
        assert!(a < b);
    }
}
