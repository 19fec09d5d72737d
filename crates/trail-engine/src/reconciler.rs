//! The reconciliation engine.
//!
//! `Reconciler::record` turns one observed mutation into at most one trail
//! entry per entity and transaction:
//! 1. Check the transaction precondition and the action
//! 2. Resolve entity identity and the correlation id
//! 3. Look for an entry already written in this transaction (registry,
//!    then store) and merge onto it
//! 4. Adopt a create recorded before the entity had an id
//! 5. Otherwise demote the entity's current entry and insert a new one
//!
//! Every error is meant to abort the caller's transaction; nothing here
//! retries or compensates.

use std::sync::Arc;

use chrono::Utc;
use trail_config::ReconcileConfig;
use trail_core::context::{
    ActorProvider, Auditable, CorrelationProvider, DeviceProvider, TenantProvider,
};
use trail_core::entities::TrailEntry;
use trail_core::enums::WriteAction;
use trail_core::errors::TrailError;
use trail_core::store::TrailStore;
use uuid::Uuid;

use crate::merge::{MergeOutcome, resolve};
use crate::scope::TrailScope;

/// Ambient lookups consulted for every new entry.
#[derive(Clone)]
pub struct Providers {
    pub actor: Arc<dyn ActorProvider>,
    pub device: Arc<dyn DeviceProvider>,
    pub tenant: Arc<dyn TenantProvider>,
    pub correlation: Arc<dyn CorrelationProvider>,
}

pub struct Reconciler {
    providers: Providers,
    config: ReconcileConfig,
}

impl Reconciler {
    #[must_use]
    pub const fn new(providers: Providers, config: ReconcileConfig) -> Self {
        Self { providers, config }
    }

    /// Record `action` on `entity` within the scope's transaction.
    ///
    /// Returns the entry now describing the entity. For a create retracted
    /// by a delete in the same transaction this is a transient entry with no
    /// sequence (see `TrailEntry::into_retracted`).
    ///
    /// # Errors
    ///
    /// - `Precondition` when the store is not inside a transaction
    /// - `InvalidAction` for reads, and for patches when they are disabled
    /// - `MissingIdentity` when a non-create entity has no id
    /// - `InvariantViolation` / `TransactionMismatch` from the merge check,
    ///   including a correlation id whose entry a later transaction has
    ///   already superseded
    /// - `Store` when the adapter fails
    pub async fn record<S: TrailStore>(
        &self,
        scope: &mut TrailScope<S>,
        entity: &dyn Auditable,
        action: WriteAction,
    ) -> Result<TrailEntry, TrailError> {
        if !scope.store.in_transaction() {
            return Err(TrailError::Precondition(
                "trail entries can only be recorded inside an active transaction".into(),
            ));
        }
        self.check_action(action)?;

        let entity_type = entity.entity_type().to_string();
        let entity_id = entity.find_id();
        if entity_id.is_none() && action != WriteAction::Create {
            return Err(TrailError::MissingIdentity {
                entity_type,
                action,
            });
        }
        let transaction_id = self.providers.correlation.current_transaction_id();

        if let (Some(id), Some(txn)) = (entity_id.as_deref(), transaction_id) {
            if let Some(prior) = find_prior(scope, txn, &entity_type, id).await? {
                return merge(scope, txn, prior, action).await;
            }
        }

        if let Some(id) = entity_id.as_deref() {
            if let Some(adopted) = adopt_unidentified(scope, transaction_id, &entity_type, id).await? {
                match transaction_id {
                    Some(txn) => return merge(scope, txn, adopted, action).await,
                    None if action == WriteAction::Create => return Ok(adopted),
                    None => {}
                }
            }
        }

        if action != WriteAction::Create {
            if let Some(id) = entity_id.as_deref() {
                demote_current(&scope.store, &entity_type, id).await?;
            }
        }

        let entry = self.build_entry(entity, entity_type, entity_id, action, transaction_id);
        let saved = scope.store.save(&entry).await?;
        match (transaction_id, saved.entity_id.is_some()) {
            (_, false) => scope.in_flight.register_unidentified(saved.clone()),
            (Some(txn), true) => scope.in_flight.register(txn, saved.clone()),
            (None, true) => {}
        }
        tracing::debug!(
            sequence = ?saved.sequence,
            entity_type = %saved.entity_type,
            entity_id = ?saved.entity_id,
            action = %saved.action,
            transaction_id = ?transaction_id,
            "trail entry recorded"
        );
        Ok(saved)
    }

    fn check_action(&self, action: WriteAction) -> Result<(), TrailError> {
        let allowed = match action {
            WriteAction::Patch => self.config.allow_patch,
            other => other.is_write(),
        };
        if allowed {
            Ok(())
        } else {
            Err(TrailError::InvalidAction { action })
        }
    }

    fn build_entry(
        &self,
        entity: &dyn Auditable,
        entity_type: String,
        entity_id: Option<String>,
        action: WriteAction,
        transaction_id: Option<Uuid>,
    ) -> TrailEntry {
        let device = self
            .providers
            .device
            .current_device()
            .unwrap_or_else(|| self.config.default_device.clone());
        let tenant = entity
            .tenant()
            .or_else(|| self.providers.tenant.current_tenant());

        TrailEntry {
            sequence: None,
            entity_type,
            entity_id,
            snapshot: entity.snapshot(),
            action,
            timestamp: Utc::now(),
            actor: self.providers.actor.current_actor(),
            device,
            tenant,
            transaction_id,
            current: true,
        }
    }
}

/// The single entry already written for this entity in this transaction.
async fn find_prior<S: TrailStore>(
    scope: &mut TrailScope<S>,
    txn: Uuid,
    entity_type: &str,
    entity_id: &str,
) -> Result<Option<TrailEntry>, TrailError> {
    let matches = scope.in_flight.matching(txn, entity_type, entity_id);
    match matches.as_slice() {
        [] => {}
        [prior] => {
            if prior.transaction_id != Some(txn) {
                return Err(TrailError::TransactionMismatch {
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    expected: txn,
                    found: prior.transaction_id,
                });
            }
            return Ok(Some((*prior).clone()));
        }
        _ => {
            return Err(TrailError::InvariantViolation(format!(
                "more than one entry for {entity_type} {entity_id} already present in transaction {txn}"
            )));
        }
    }

    // Flushed by an earlier scope of the same logical transaction.
    let Some(flushed) = scope
        .store
        .find_by_transaction(entity_type, entity_id, txn)
        .await?
    else {
        return Ok(None);
    };
    if !flushed.current {
        // A later transaction superseded it; the id is stale.
        let current = scope.store.find_current(entity_type, entity_id).await?;
        tracing::warn!(
            sequence = ?flushed.sequence,
            entity_type,
            entity_id,
            transaction_id = %txn,
            "correlation id refers to a superseded trail entry"
        );
        return Err(TrailError::TransactionMismatch {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            expected: txn,
            found: current.and_then(|c| c.transaction_id),
        });
    }
    tracing::debug!(
        sequence = ?flushed.sequence,
        entity_type,
        entity_id,
        "merging onto entry flushed earlier in this transaction"
    );
    scope.in_flight.register(txn, flushed.clone());
    Ok(Some(flushed))
}

async fn merge<S: TrailStore>(
    scope: &mut TrailScope<S>,
    txn: Uuid,
    prior: TrailEntry,
    action: WriteAction,
) -> Result<TrailEntry, TrailError> {
    let outcome = resolve(prior.action, action).inspect_err(|e| {
        tracing::warn!(
            entity_type = %prior.entity_type,
            entity_id = ?prior.entity_id,
            prior = %prior.action,
            next = %action,
            error = %e,
            "merge rejected"
        );
    })?;

    match outcome {
        MergeOutcome::Keep => Ok(prior),
        MergeOutcome::Retract => {
            scope.in_flight.remove(txn, &prior);
            scope.store.delete(&prior).await?;
            tracing::debug!(
                sequence = ?prior.sequence,
                entity_type = %prior.entity_type,
                entity_id = ?prior.entity_id,
                "create retracted by delete in the same transaction"
            );
            Ok(prior.into_retracted())
        }
        MergeOutcome::Replace(next) => {
            let from = prior.action;
            let updated = TrailEntry {
                action: next,
                ..prior
            };
            let saved = scope.store.save(&updated).await?;
            scope.in_flight.replace(txn, saved.clone());
            tracing::debug!(
                sequence = ?saved.sequence,
                entity_type = %saved.entity_type,
                from = %from,
                to = %next,
                "merged into existing entry"
            );
            Ok(saved)
        }
    }
}

/// Give the oldest id-less create of `entity_type` in this scope the id that
/// was just resolved, provided the id has no current entry of its own.
async fn adopt_unidentified<S: TrailStore>(
    scope: &mut TrailScope<S>,
    transaction_id: Option<Uuid>,
    entity_type: &str,
    entity_id: &str,
) -> Result<Option<TrailEntry>, TrailError> {
    if !scope.in_flight.has_unidentified(entity_type) {
        return Ok(None);
    }
    if scope.store.find_current(entity_type, entity_id).await?.is_some() {
        return Ok(None);
    }
    let Some(pending) = scope.in_flight.take_unidentified(entity_type) else {
        return Ok(None);
    };
    let identified = TrailEntry {
        entity_id: Some(entity_id.to_string()),
        ..pending
    };
    let saved = scope.store.save(&identified).await?;
    if let Some(txn) = transaction_id {
        scope.in_flight.register(txn, saved.clone());
    }
    tracing::debug!(
        sequence = ?saved.sequence,
        entity_type,
        entity_id,
        "id assigned to create recorded without one"
    );
    Ok(Some(saved))
}

/// Clear the current flag of the entity's latest entry before a new one is
/// written.
async fn demote_current<S: TrailStore>(
    store: &S,
    entity_type: &str,
    entity_id: &str,
) -> Result<(), TrailError> {
    let Some(previous) = store.find_current(entity_type, entity_id).await? else {
        return Ok(());
    };
    let demoted = TrailEntry {
        current: false,
        ..previous
    };
    store.save(&demoted).await?;
    tracing::debug!(
        sequence = ?demoted.sequence,
        entity_type,
        entity_id,
        "previous current entry demoted"
    );
    Ok(())
}
