use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::WriteAction;

/// One durable record of a single reconciled mutation to an entity.
///
/// `sequence` is `None` until the store assigns it. Only `action` and
/// `current` change after the first write.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TrailEntry {
    pub sequence: Option<i64>,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub snapshot: serde_json::Value,
    pub action: WriteAction,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub device: String,
    pub tenant: Option<String>,
    pub transaction_id: Option<Uuid>,
    pub current: bool,
}

impl TrailEntry {
    /// Whether the store has assigned a sequence to this entry.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.sequence.is_some()
    }

    /// Whether this entry describes `entity_type`/`entity_id`.
    #[must_use]
    pub fn is_for(&self, entity_type: &str, entity_id: &str) -> bool {
        self.entity_type == entity_type && self.entity_id.as_deref() == Some(entity_id)
    }

    /// Transient marker for a create that was retracted before it became
    /// durable. Carries no sequence and is never current.
    #[must_use]
    pub fn into_retracted(mut self) -> Self {
        self.sequence = None;
        self.action = WriteAction::Delete;
        self.current = false;
        self
    }
}
