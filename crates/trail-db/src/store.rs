//! `TrailStore` implementation over a caller-owned libSQL transaction.

use trail_core::entities::TrailEntry;
use trail_core::errors::StoreError;
use trail_core::store::TrailStore;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::helpers::{ENTRY_COLUMNS, row_to_entry};
use crate::repos::trail::{TrailFilter, query_entries};

/// Trail store bound to one connection, normally a `libsql::Transaction`.
///
/// Borrowing the connection keeps the transaction's lifetime with the
/// caller: the store can never commit, and it cannot outlive the
/// transaction it writes through.
pub struct SqlTrailStore<'c> {
    conn: &'c libsql::Connection,
}

impl<'c> SqlTrailStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c libsql::Connection) -> Self {
        Self { conn }
    }

    /// Filtered read on the same transaction, seeing uncommitted writes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn query(&self, filter: &TrailFilter) -> Result<Vec<TrailEntry>, StoreError> {
        Ok(query_entries(self.conn, filter).await?)
    }

    async fn insert(&self, entry: &TrailEntry) -> Result<TrailEntry, DatabaseError> {
        let snapshot = entry.snapshot.to_string();
        let transaction_id = entry.transaction_id.map(|t| t.to_string());
        let mut rows = self
            .conn
            .query(
                "INSERT INTO trail_entries (entity_type, entity_id, snapshot, action, timestamp, actor, device, tenant, transaction_id, current)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 RETURNING sequence",
                libsql::params![
                    entry.entity_type.as_str(),
                    entry.entity_id.as_deref(),
                    snapshot,
                    entry.action.as_str(),
                    entry.timestamp.to_rfc3339(),
                    entry.actor.as_str(),
                    entry.device.as_str(),
                    entry.tenant.as_deref(),
                    transaction_id.as_deref(),
                    i64::from(entry.current)
                ],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let sequence = row.get::<i64>(0)?;

        tracing::debug!(
            sequence,
            entity_type = %entry.entity_type,
            entity_id = ?entry.entity_id,
            action = %entry.action,
            "trail entry inserted"
        );
        Ok(TrailEntry {
            sequence: Some(sequence),
            ..entry.clone()
        })
    }

    async fn update(&self, sequence: i64, entry: &TrailEntry) -> Result<TrailEntry, DatabaseError> {
        let changed = self
            .conn
            .execute(
                "UPDATE trail_entries SET action = ?1, current = ?2, entity_id = ?3 WHERE sequence = ?4",
                libsql::params![
                    entry.action.as_str(),
                    i64::from(entry.current),
                    entry.entity_id.as_deref(),
                    sequence
                ],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        tracing::debug!(
            sequence,
            action = %entry.action,
            current = entry.current,
            "trail entry updated"
        );
        Ok(entry.clone())
    }

    /// Fetch at most one row; a second row means the table is inconsistent.
    async fn fetch_single(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
        what: &str,
    ) -> Result<Option<TrailEntry>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, libsql::params_from_iter(params))
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let entry = row_to_entry(&row)?;
        if rows.next().await?.is_some() {
            return Err(DatabaseError::InvalidState(format!(
                "more than one {what} entry for {} {}",
                entry.entity_type,
                entry.entity_id.as_deref().unwrap_or("<none>")
            )));
        }
        Ok(Some(entry))
    }
}

impl TrailStore for SqlTrailStore<'_> {
    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    async fn save(&self, entry: &TrailEntry) -> Result<TrailEntry, StoreError> {
        let saved = match entry.sequence {
            None => self.insert(entry).await?,
            Some(sequence) => self.update(sequence, entry).await?,
        };
        Ok(saved)
    }

    async fn delete(&self, entry: &TrailEntry) -> Result<(), StoreError> {
        let sequence = entry.sequence.ok_or_else(|| {
            StoreError::InvalidState("cannot delete a trail entry that was never stored".into())
        })?;
        let removed = self
            .conn
            .execute("DELETE FROM trail_entries WHERE sequence = ?1", [sequence])
            .await
            .map_err(DatabaseError::from)?;
        if removed == 0 {
            return Err(StoreError::NoResult);
        }
        tracing::debug!(sequence, "trail entry deleted");
        Ok(())
    }

    async fn find_current(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<TrailEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM trail_entries
             WHERE entity_type = ?1 AND entity_id = ?2 AND current = 1
             LIMIT 2"
        );
        Ok(self
            .fetch_single(&sql, vec![entity_type.into(), entity_id.into()], "current")
            .await?)
    }

    async fn find_by_transaction(
        &self,
        entity_type: &str,
        entity_id: &str,
        transaction_id: Uuid,
    ) -> Result<Option<TrailEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM trail_entries
             WHERE entity_type = ?1 AND entity_id = ?2 AND transaction_id = ?3
             LIMIT 2"
        );
        Ok(self
            .fetch_single(
                &sql,
                vec![
                    entity_type.into(),
                    entity_id.into(),
                    transaction_id.to_string().into(),
                ],
                "same-transaction",
            )
            .await?)
    }
}
