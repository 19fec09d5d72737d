//! Trail queries.
//!
//! Dynamic filtering over committed (or, through `SqlTrailStore::query`,
//! in-transaction) entries, per-entity history, and the device sync feed.

use trail_core::entities::TrailEntry;
use trail_core::enums::WriteAction;
use uuid::Uuid;

use crate::TrailDb;
use crate::error::DatabaseError;
use crate::helpers::{ENTRY_COLUMNS, row_to_entry};

const DEFAULT_LIMIT: u32 = 100;

/// Filter criteria for trail queries. Empty criteria match everything.
#[derive(Debug, Default, Clone)]
pub struct TrailFilter {
    /// Match any of these entity types.
    pub entity_types: Vec<String>,
    pub entity_id: Option<String>,
    pub action: Option<WriteAction>,
    pub transaction_id: Option<Uuid>,
    pub tenant: Option<String>,
    /// Only entries flagged current.
    pub current_only: bool,
    /// Skip entries written by this device.
    pub exclude_device: Option<String>,
    /// Only entries with a sequence strictly greater than this cursor.
    pub after_sequence: Option<i64>,
    pub limit: Option<u32>,
}

impl TrailFilter {
    /// All entries of one entity.
    #[must_use]
    pub fn for_entity(entity_type: &str, entity_id: &str) -> Self {
        Self {
            entity_types: vec![entity_type.to_string()],
            entity_id: Some(entity_id.to_string()),
            ..Self::default()
        }
    }

    fn to_sql(&self) -> (String, Vec<libsql::Value>) {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if !self.entity_types.is_empty() {
            let mut placeholders = Vec::with_capacity(self.entity_types.len());
            for et in &self.entity_types {
                params.push(libsql::Value::Text(et.clone()));
                placeholders.push(format!("?{}", params.len()));
            }
            conditions.push(format!("entity_type IN ({})", placeholders.join(", ")));
        }
        if let Some(ref eid) = self.entity_id {
            params.push(libsql::Value::Text(eid.clone()));
            conditions.push(format!("entity_id = ?{}", params.len()));
        }
        if let Some(action) = self.action {
            params.push(libsql::Value::Text(action.as_str().to_string()));
            conditions.push(format!("action = ?{}", params.len()));
        }
        if let Some(txn) = self.transaction_id {
            params.push(libsql::Value::Text(txn.to_string()));
            conditions.push(format!("transaction_id = ?{}", params.len()));
        }
        if let Some(ref tenant) = self.tenant {
            params.push(libsql::Value::Text(tenant.clone()));
            conditions.push(format!("tenant = ?{}", params.len()));
        }
        if self.current_only {
            conditions.push("current = 1".to_string());
        }
        if let Some(ref device) = self.exclude_device {
            params.push(libsql::Value::Text(device.clone()));
            conditions.push(format!("device <> ?{}", params.len()));
        }
        if let Some(after) = self.after_sequence {
            params.push(libsql::Value::Integer(after));
            conditions.push(format!("sequence > ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM trail_entries {where_clause}
             ORDER BY sequence ASC LIMIT {limit}"
        );
        (sql, params)
    }
}

/// Run a filtered query on any connection (or transaction).
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails or a row is malformed.
pub async fn query_entries(
    conn: &libsql::Connection,
    filter: &TrailFilter,
) -> Result<Vec<TrailEntry>, DatabaseError> {
    let (sql, params) = filter.to_sql();
    let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;

    let mut entries = Vec::new();
    while let Some(row) = rows.next().await? {
        entries.push(row_to_entry(&row)?);
    }
    Ok(entries)
}

impl TrailDb {
    /// Query trail entries with optional filters, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_trail(&self, filter: &TrailFilter) -> Result<Vec<TrailEntry>, DatabaseError> {
        query_entries(self.conn(), filter).await
    }

    /// Every entry recorded for one entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn history(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<TrailEntry>, DatabaseError> {
        let filter = TrailFilter {
            limit: Some(u32::MAX),
            ..TrailFilter::for_entity(entity_type, entity_id)
        };
        self.query_trail(&filter).await
    }

    /// Device sync feed: current entries of `entity_types` written by any
    /// device other than `ignore_device`, after the `after_sequence` cursor.
    ///
    /// Callers page by passing the last returned sequence as the next cursor.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn changes_since(
        &self,
        entity_types: &[&str],
        ignore_device: &str,
        after_sequence: i64,
        limit: u32,
    ) -> Result<Vec<TrailEntry>, DatabaseError> {
        if entity_types.is_empty() {
            return Ok(Vec::new());
        }
        let filter = TrailFilter {
            entity_types: entity_types.iter().map(|t| (*t).to_string()).collect(),
            current_only: true,
            exclude_device: Some(ignore_device.to_string()),
            after_sequence: Some(after_sequence),
            limit: Some(limit),
            ..TrailFilter::default()
        };
        self.query_trail(&filter).await
    }

    /// Number of entries flagged current for one entity. Zero or one on a
    /// consistent table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_current(&self, entity_type: &str, entity_id: &str) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM trail_entries
                 WHERE entity_type = ?1 AND entity_id = ?2 AND current = 1",
                [entity_type, entity_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let count = row.get::<i64>(0)?;
        u64::try_from(count).map_err(|e| DatabaseError::InvalidState(format!("negative count: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (sql, params) = TrailFilter::default().to_sql();
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("LIMIT 100"));
        assert!(params.is_empty());
    }

    #[test]
    fn placeholders_are_numbered_in_order() {
        let filter = TrailFilter {
            entity_types: vec!["invoice".into(), "order".into()],
            tenant: Some("acme".into()),
            current_only: true,
            after_sequence: Some(10),
            limit: Some(5),
            ..TrailFilter::default()
        };
        let (sql, params) = filter.to_sql();
        assert!(sql.contains("entity_type IN (?1, ?2)"));
        assert!(sql.contains("tenant = ?3"));
        assert!(sql.contains("current = 1"));
        assert!(sql.contains("sequence > ?4"));
        assert!(sql.contains("LIMIT 5"));
        assert_eq!(params.len(), 4);
    }
}
