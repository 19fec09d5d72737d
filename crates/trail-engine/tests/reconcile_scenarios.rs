//! End-to-end reconciliation scenarios against an in-memory libSQL trail.
//!
//! - Precondition and action checks
//! - Same-transaction merges (keep, retract, promote, undelete)
//! - Cross-transaction demotion and the single-current invariant
//! - Entry enrichment (actor, device, tenant)
//! - The `WriteObserver` seam

use std::sync::Arc;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use trail_config::ReconcileConfig;
use trail_core::context::Auditable;
use trail_core::correlation::CorrelationSlot;
use trail_core::entities::TrailEntry;
use trail_core::enums::WriteAction::{self, Create, Delete, Patch, Read, Update};
use trail_core::errors::{StoreError, TrailError};
use trail_db::repos::trail::TrailFilter;
use trail_db::{SqlTrailStore, TrailDb};
use trail_engine::{ObservedScope, Providers, Reconciler, TrailScope, WriteObserver};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Invoice {
    id: Option<i64>,
    tenant: Option<String>,
    total: i64,
}

impl Invoice {
    const fn new(id: i64) -> Self {
        Self {
            id: Some(id),
            tenant: None,
            total: 100,
        }
    }
}

impl Auditable for Invoice {
    fn entity_type(&self) -> &str {
        "invoice"
    }

    fn find_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn tenant(&self) -> Option<String> {
        self.tenant.clone()
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id, "total": self.total })
    }
}

struct Harness {
    db: TrailDb,
    correlation: Arc<CorrelationSlot>,
    reconciler: Reconciler,
}

async fn harness() -> Harness {
    harness_with(ReconcileConfig::default(), None, None).await
}

async fn harness_with(
    config: ReconcileConfig,
    device: Option<&str>,
    tenant: Option<&str>,
) -> Harness {
    let device = device.map(str::to_string);
    let tenant = tenant.map(str::to_string);
    let correlation = Arc::new(CorrelationSlot::new());
    let providers = Providers {
        actor: Arc::new(|| "alice".to_string()),
        device: Arc::new(move || device.clone()),
        tenant: Arc::new(move || tenant.clone()),
        correlation: correlation.clone(),
    };
    Harness {
        db: TrailDb::open_local(":memory:").await.unwrap(),
        correlation,
        reconciler: Reconciler::new(providers, config),
    }
}

impl Harness {
    /// Run `actions` on `entity` in one committed transaction under a fresh
    /// correlation id.
    async fn commit(&self, entity: &Invoice, actions: &[WriteAction]) -> Vec<TrailEntry> {
        self.correlation.set(Some(Uuid::new_v4()));
        let tx = self.db.begin().await.unwrap();
        let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
        let mut recorded = Vec::new();
        for &action in actions {
            recorded.push(self.reconciler.record(&mut scope, entity, action).await.unwrap());
        }
        let _ = scope.finish();
        tx.commit().await.unwrap();
        self.correlation.clear();
        recorded
    }

    async fn history(&self, id: &str) -> Vec<TrailEntry> {
        self.db.history("invoice", id).await.unwrap()
    }
}

fn actions_and_flags(entries: &[TrailEntry]) -> Vec<(WriteAction, bool)> {
    entries.iter().map(|e| (e.action, e.current)).collect()
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_outside_transaction_is_rejected() {
    let h = harness().await;
    let mut scope = TrailScope::new(SqlTrailStore::new(h.db.conn()));

    let err = h
        .reconciler
        .record(&mut scope, &Invoice::new(1), Create)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::Precondition(_)));
    assert!(h.history("1").await.is_empty());
}

#[tokio::test]
async fn read_action_is_rejected() {
    let h = harness().await;
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));

    let err = h
        .reconciler
        .record(&mut scope, &Invoice::new(1), Read)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::InvalidAction { action: Read }));
}

#[tokio::test]
async fn patch_is_rejected_when_disabled() {
    let config = ReconcileConfig {
        allow_patch: false,
        ..ReconcileConfig::default()
    };
    let h = harness_with(config, None, None).await;
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));

    let err = h
        .reconciler
        .record(&mut scope, &Invoice::new(1), Patch)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::InvalidAction { action: Patch }));
}

#[tokio::test]
async fn update_without_identity_is_rejected() {
    let h = harness().await;
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    let unsaved = Invoice {
        id: None,
        tenant: None,
        total: 5,
    };

    let err = h
        .reconciler
        .record(&mut scope, &unsaved, Update)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrailError::MissingIdentity { ref entity_type, action: Update } if entity_type == "invoice"
    ));
}

const UNSAVED: Invoice = Invoice {
    id: None,
    tenant: None,
    total: 100,
};

#[tokio::test]
async fn create_without_identity_is_held_until_id_is_known() {
    let h = harness().await;
    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));

    let entry = h.reconciler.record(&mut scope, &UNSAVED, Create).await.unwrap();
    assert!(entry.is_persisted());
    assert_eq!(entry.entity_id, None);
    assert!(scope.in_flight().is_empty());
    assert_eq!(scope.in_flight().unidentified_len(), 1);
}

#[tokio::test]
async fn id_assigned_after_create_merges_into_it() {
    let h = harness().await;
    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));

    let created = h.reconciler.record(&mut scope, &UNSAVED, Create).await.unwrap();
    let merged = h
        .reconciler
        .record(&mut scope, &Invoice::new(1), Update)
        .await
        .unwrap();
    assert_eq!(merged.sequence, created.sequence);
    assert_eq!(merged.entity_id.as_deref(), Some("1"));
    assert_eq!(scope.in_flight().unidentified_len(), 0);
    let _ = scope.finish();
    tx.commit().await.unwrap();

    assert_eq!(actions_and_flags(&h.history("1").await), vec![(Create, true)]);
    let all = h.db.query_trail(&TrailFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn id_assigned_after_create_without_correlation_demotes_it() {
    let h = harness().await;
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &UNSAVED, Create).await.unwrap();
    h.reconciler
        .record(&mut scope, &Invoice::new(1), Update)
        .await
        .unwrap();
    let _ = scope.finish();
    tx.commit().await.unwrap();

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
    let all = h.db.query_trail(&TrailFilter::default()).await.unwrap();
    assert!(all.iter().all(|e| e.entity_id.is_some()));
}

#[tokio::test]
async fn id_less_create_is_not_claimed_by_an_existing_entity() {
    let h = harness().await;
    h.commit(&Invoice::new(2), &[Create]).await;

    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &UNSAVED, Create).await.unwrap();
    h.reconciler
        .record(&mut scope, &Invoice::new(2), Update)
        .await
        .unwrap();
    assert_eq!(scope.in_flight().unidentified_len(), 1);
    let _ = scope.finish();
    tx.commit().await.unwrap();

    assert_eq!(
        actions_and_flags(&h.history("2").await),
        vec![(Create, false), (Update, true)]
    );
}

// ---------------------------------------------------------------------------
// Same-transaction merges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_update_keeps_single_create() {
    let h = harness().await;
    let recorded = h.commit(&Invoice::new(1), &[Create, Update]).await;

    assert_eq!(recorded[0].sequence, recorded[1].sequence);
    assert_eq!(actions_and_flags(&h.history("1").await), vec![(Create, true)]);
}

#[tokio::test]
async fn update_twice_yields_one_entry() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;
    h.commit(&invoice, &[Update, Update]).await;

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
}

#[tokio::test]
async fn create_then_delete_retracts_entirely() {
    let h = harness().await;
    let recorded = h.commit(&Invoice::new(1), &[Create, Delete]).await;

    let marker = &recorded[1];
    assert!(!marker.is_persisted());
    assert_eq!(marker.action, Delete);
    assert!(!marker.current);
    assert!(h.history("1").await.is_empty());
}

#[tokio::test]
async fn create_update_delete_leaves_nothing() {
    let h = harness().await;
    h.commit(&Invoice::new(1), &[Create, Update, Delete]).await;

    assert!(h.history("1").await.is_empty());
    assert_eq!(h.db.count_current("invoice", "1").await.unwrap(), 0);
}

#[tokio::test]
async fn update_then_delete_promotes_to_delete() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;
    let recorded = h.commit(&invoice, &[Update, Delete]).await;

    assert_eq!(recorded[0].sequence, recorded[1].sequence);
    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Delete, true)]
    );
}

#[tokio::test]
async fn delete_then_update_undeletes() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;
    h.commit(&invoice, &[Delete, Update]).await;

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
}

#[tokio::test]
async fn patch_then_update_becomes_update() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;
    h.commit(&invoice, &[Patch, Patch, Update]).await;

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
}

#[tokio::test]
async fn create_after_update_is_a_violation_and_rolls_back() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;

    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &invoice, Update).await.unwrap();
    let err = h
        .reconciler
        .record(&mut scope, &invoice, Create)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::InvariantViolation(_)));

    drop(scope);
    tx.rollback().await.unwrap();
    assert_eq!(actions_and_flags(&h.history("1").await), vec![(Create, true)]);
}

#[tokio::test]
async fn patch_after_delete_is_a_violation() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;

    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &invoice, Delete).await.unwrap();
    let err = h
        .reconciler
        .record(&mut scope, &invoice, Patch)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::InvariantViolation(_)));
}

#[tokio::test]
async fn entry_flushed_by_earlier_scope_is_merged() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();

    let mut first = TrailScope::new(SqlTrailStore::new(&tx));
    let created = h.reconciler.record(&mut first, &invoice, Create).await.unwrap();
    let _ = first.finish();

    let mut second = TrailScope::new(SqlTrailStore::new(&tx));
    let merged = h.reconciler.record(&mut second, &invoice, Update).await.unwrap();
    assert_eq!(merged.sequence, created.sequence);
    assert_eq!(merged.action, Create);
    assert_eq!(second.in_flight().len(), 1);

    let _ = second.finish();
    tx.commit().await.unwrap();
    assert_eq!(actions_and_flags(&h.history("1").await), vec![(Create, true)]);
}

// ---------------------------------------------------------------------------
// Cross-transaction demotion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reused_correlation_id_cannot_touch_superseded_entry() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    let stale = Uuid::new_v4();

    h.correlation.set(Some(stale));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &invoice, Create).await.unwrap();
    let _ = scope.finish();
    tx.commit().await.unwrap();

    let updated = h.commit(&invoice, &[Update]).await;

    h.correlation.set(Some(stale));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    let err = h
        .reconciler
        .record(&mut scope, &invoice, Delete)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrailError::TransactionMismatch { expected, found, .. }
            if expected == stale && found == updated[0].transaction_id
    ));
    drop(scope);
    tx.rollback().await.unwrap();

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
}

#[tokio::test]
async fn update_in_new_transaction_demotes_previous() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    let first = h.commit(&invoice, &[Create]).await;
    let second = h.commit(&invoice, &[Update]).await;

    let history = h.history("1").await;
    assert_eq!(actions_and_flags(&history), vec![(Create, false), (Update, true)]);
    assert_eq!(history[0].sequence, first[0].sequence);
    assert_eq!(history[1].sequence, second[0].sequence);
    assert_ne!(history[0].transaction_id, history[1].transaction_id);
}

#[tokio::test]
async fn at_most_one_current_after_many_transactions() {
    let h = harness().await;
    let invoice = Invoice::new(7);
    h.commit(&invoice, &[Create]).await;
    let rounds: [&[WriteAction]; 4] = [&[Update], &[Patch], &[Delete, Update], &[Delete]];
    for actions in rounds {
        h.commit(&invoice, actions).await;
        assert_eq!(h.db.count_current("invoice", "7").await.unwrap(), 1);
    }
    assert_eq!(h.history("7").await.len(), 5);
}

#[tokio::test]
async fn without_correlation_every_write_is_its_own_entry() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    h.reconciler.record(&mut scope, &invoice, Create).await.unwrap();
    h.reconciler.record(&mut scope, &invoice, Update).await.unwrap();
    assert!(scope.in_flight().is_empty());
    let _ = scope.finish();
    tx.commit().await.unwrap();

    assert_eq!(
        actions_and_flags(&h.history("1").await),
        vec![(Create, false), (Update, true)]
    );
}

#[tokio::test]
async fn second_create_for_current_entity_is_a_store_conflict() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.commit(&invoice, &[Create]).await;

    h.correlation.set(Some(Uuid::new_v4()));
    let tx = h.db.begin().await.unwrap();
    let mut scope = TrailScope::new(SqlTrailStore::new(&tx));
    let err = h
        .reconciler
        .record(&mut scope, &invoice, Create)
        .await
        .unwrap_err();
    assert!(matches!(err, TrailError::Store(StoreError::Conflict(_))));
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entry_carries_actor_snapshot_and_default_device() {
    let config = ReconcileConfig {
        default_device: "server".into(),
        ..ReconcileConfig::default()
    };
    let h = harness_with(config, None, Some("acme")).await;
    let recorded = h.commit(&Invoice::new(1), &[Create]).await;

    let entry = &recorded[0];
    assert_eq!(entry.actor, "alice");
    assert_eq!(entry.device, "server");
    assert_eq!(entry.tenant.as_deref(), Some("acme"));
    assert_eq!(entry.snapshot, serde_json::json!({ "id": 1, "total": 100 }));
    assert!(entry.transaction_id.is_some());
}

#[tokio::test]
async fn entity_tenant_overrides_provider_and_device_is_resolved() {
    let h = harness_with(ReconcileConfig::default(), Some("tablet"), Some("acme")).await;
    let invoice = Invoice {
        tenant: Some("globex".into()),
        ..Invoice::new(2)
    };
    let recorded = h.commit(&invoice, &[Create]).await;

    assert_eq!(recorded[0].tenant.as_deref(), Some("globex"));
    assert_eq!(recorded[0].device, "tablet");
}

#[tokio::test]
async fn device_defaults_to_empty() {
    let h = harness().await;
    let recorded = h.commit(&Invoice::new(3), &[Create]).await;
    assert_eq!(recorded[0].device, "");
    assert_eq!(recorded[0].tenant, None);
}

// ---------------------------------------------------------------------------
// Observer seam
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observed_scope_records_each_write() {
    let h = harness().await;
    let invoice = Invoice::new(1);
    h.correlation.set_from_param(Some("6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b"));

    let tx = h.db.begin().await.unwrap();
    let mut observer = ObservedScope::new(&h.reconciler, SqlTrailStore::new(&tx));
    observer.on_write(&invoice, Create).await.unwrap();
    let kept = observer.on_write(&invoice, Patch).await.unwrap();
    assert_eq!(kept.action, Create);
    assert_eq!(observer.scope().in_flight().len(), 1);
    let _ = observer.finish();
    tx.commit().await.unwrap();

    let history = h.history("1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].transaction_id,
        Uuid::parse_str("6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b").ok()
    );
}
