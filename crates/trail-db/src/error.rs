//! Database error types for trail-db.

use thiserror::Error;
use trail_core::errors::StoreError;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// SQLite messages that mean another writer got there first.
const CONFLICT_MARKERS: [&str; 3] = [
    "UNIQUE constraint failed",
    "database is locked",
    "SQLITE_BUSY",
];

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::LibSql(inner) => {
                let msg = inner.to_string();
                if CONFLICT_MARKERS.iter().any(|m| msg.contains(m)) {
                    Self::Conflict(msg)
                } else {
                    Self::Query(msg)
                }
            }
            DatabaseError::Query(msg) => Self::Query(msg),
            DatabaseError::NoResult => Self::NoResult,
            DatabaseError::InvalidState(msg) | DatabaseError::Migration(msg) => {
                Self::InvalidState(msg)
            }
            DatabaseError::Other(inner) => Self::Other(inner),
        }
    }
}
