//! Unified error type for the graveyard application.
//!
//! All crates funnel their failures into [`Error`]. The variants mirror the
//! failure classes the backup engine distinguishes: storage errors, the
//! expected unique-conflict driving the upsert update branch, transport
//! failures, a forbidden login session, and parse problems.

/// Unified error type covering all failure modes in graveyard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "account", "user").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A unique constraint was violated. Expected during upserts, where it
    /// selects the update branch; it never escapes the upsert protocol.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// A transaction body returned an error and the transaction was rolled
    /// back.
    #[error("Transaction aborted: {0}")]
    TxnAborted(String),

    /// The login session was rejected by the remote site (redirect to the
    /// login wall or a redirect loop). The owning account must be flagged
    /// invalid and the running task aborted.
    #[error("login session is forbidden or expired")]
    SessionInvalid,

    /// An HTTP request failed in a way that is not retryable.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A payload could not be decoded into a canonical record.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Integrity`].
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// Convenience constructor for [`Error::Http`].
    pub fn http(msg: impl Into<String>) -> Self {
        Error::Http(msg.into())
    }

    /// Convenience constructor for [`Error::Parse`].
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("account", 7);
        assert_eq!(err.to_string(), "account not found: 7");
    }

    #[test]
    fn database_display() {
        let err = Error::database("locked");
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn session_invalid_display() {
        let err = Error::SessionInvalid;
        assert_eq!(err.to_string(), "login session is forbidden or expired");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}
