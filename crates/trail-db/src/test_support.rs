//! Shared test utilities for trail-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use chrono::Utc;
    use trail_core::entities::TrailEntry;
    use trail_core::enums::WriteAction;
    use uuid::Uuid;

    use crate::TrailDb;

    /// Create an in-memory database with migrations applied.
    pub async fn test_db() -> TrailDb {
        TrailDb::open_local(":memory:").await.unwrap()
    }

    /// Unsaved current entry with a fresh correlation id.
    pub fn sample_entry(entity_type: &str, entity_id: &str, action: WriteAction) -> TrailEntry {
        TrailEntry {
            sequence: None,
            entity_type: entity_type.to_string(),
            entity_id: Some(entity_id.to_string()),
            snapshot: serde_json::json!({ "id": entity_id }),
            action,
            timestamp: Utc::now(),
            actor: "tester".to_string(),
            device: String::new(),
            tenant: None,
            transaction_id: Some(Uuid::new_v4()),
            current: true,
        }
    }
}
