//! # trail-db
//!
//! libSQL storage for the audit trail.
//!
//! Provides the `TrailDb` handle (open + migrations), `SqlTrailStore`, the
//! `TrailStore` implementation the reconciliation engine writes through, and
//! read-side trail queries (filtered listing, per-entity history, device
//! sync feed).
//!
//! Store writes always run on a transaction the caller opened with
//! [`TrailDb::begin`]; nothing in this crate commits on its own.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod store;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::Builder;
use trail_config::DbConfig;

pub use store::SqlTrailStore;

/// Central database handle for trail operations.
pub struct TrailDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl TrailDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let trail_db = Self { db, conn };
        trail_db.run_migrations().await?;
        tracing::debug!(path, "trail database opened");
        Ok(trail_db)
    }

    /// Open the database described by the `[db]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DbConfig) -> Result<Self, DatabaseError> {
        if config.is_in_memory() {
            tracing::warn!("trail database is in memory; entries are lost on exit");
        }
        Self::open_local(&config.path).await
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Begin a transaction on the shared connection.
    ///
    /// The returned transaction dereferences to a connection, so it can be
    /// handed to [`SqlTrailStore::new`]. Dropping it without committing
    /// rolls back.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if `BEGIN` fails (e.g. a transaction is
    /// already open on this connection).
    pub async fn begin(&self) -> Result<libsql::Transaction, DatabaseError> {
        Ok(self.conn.transaction().await?)
    }
}
