//! Repository contract for trail entries.
//!
//! Implementations operate on a transaction owned by the caller and never
//! begin or commit one themselves. `trail-db` provides the libSQL
//! implementation.

use uuid::Uuid;

use crate::entities::TrailEntry;
use crate::errors::StoreError;

/// Typed persistence operations over trail rows.
#[allow(async_fn_in_trait)]
pub trait TrailStore {
    /// Whether the underlying connection is inside an explicit transaction.
    fn in_transaction(&self) -> bool;

    /// Insert a new entry (no sequence yet) or update `action`, `current`
    /// and `entity_id` of an existing one. Returns the stored entry.
    async fn save(&self, entry: &TrailEntry) -> Result<TrailEntry, StoreError>;

    /// Remove a stored entry. Only used to retract a provisional create.
    async fn delete(&self, entry: &TrailEntry) -> Result<(), StoreError>;

    /// The entry flagged current for `entity_type`/`entity_id`, if any.
    async fn find_current(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<TrailEntry>, StoreError>;

    /// An entry already written under `transaction_id` for the entity.
    async fn find_by_transaction(
        &self,
        entity_type: &str,
        entity_id: &str,
        transaction_id: Uuid,
    ) -> Result<Option<TrailEntry>, StoreError>;
}
