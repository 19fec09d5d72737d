//! In-flight registry.
//!
//! Entries written during the active transaction, keyed by correlation id,
//! plus creates recorded before the store assigned an id. Lives inside a
//! `TrailScope`, so it is dropped together with the transaction it describes
//! and is never shared between threads.

use std::collections::HashMap;

use trail_core::entities::TrailEntry;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: HashMap<Uuid, Vec<TrailEntry>>,
    /// Id-less creates in recording order.
    unidentified: Vec<TrailEntry>,
}

impl InFlightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries under `transaction_id` for the entity.
    #[must_use]
    pub fn matching(&self, transaction_id: Uuid, entity_type: &str, entity_id: &str) -> Vec<&TrailEntry> {
        self.entries
            .get(&transaction_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|e| e.is_for(entity_type, entity_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn register(&mut self, transaction_id: Uuid, entry: TrailEntry) {
        self.entries.entry(transaction_id).or_default().push(entry);
    }

    /// Swap in the stored version of an entry (same sequence).
    pub fn replace(&mut self, transaction_id: Uuid, entry: TrailEntry) {
        if let Some(slot) = self
            .entries
            .get_mut(&transaction_id)
            .and_then(|bucket| bucket.iter_mut().find(|e| e.sequence == entry.sequence))
        {
            *slot = entry;
        }
    }

    /// Forget an entry (same sequence). Returns whether it was present.
    pub fn remove(&mut self, transaction_id: Uuid, entry: &TrailEntry) -> bool {
        let Some(bucket) = self.entries.get_mut(&transaction_id) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|e| e.sequence != entry.sequence);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.entries.remove(&transaction_id);
        }
        removed
    }

    /// Track a create stored without an entity id.
    pub fn register_unidentified(&mut self, entry: TrailEntry) {
        self.unidentified.push(entry);
    }

    #[must_use]
    pub fn has_unidentified(&self, entity_type: &str) -> bool {
        self.unidentified.iter().any(|e| e.entity_type == entity_type)
    }

    /// Remove and return the oldest id-less create of `entity_type`.
    pub fn take_unidentified(&mut self, entity_type: &str) -> Option<TrailEntry> {
        let pos = self
            .unidentified
            .iter()
            .position(|e| e.entity_type == entity_type)?;
        Some(self.unidentified.remove(pos))
    }

    #[must_use]
    pub fn unidentified_len(&self) -> usize {
        self.unidentified.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// No keyed entries. Id-less creates are counted separately.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
