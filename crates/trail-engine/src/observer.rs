//! Interception seam.
//!
//! The persistence layer calls a `WriteObserver` once per mutation it
//! performs (create, update, patch, delete) and aborts its transaction when
//! the observer fails.

use trail_core::context::Auditable;
use trail_core::entities::TrailEntry;
use trail_core::enums::WriteAction;
use trail_core::errors::TrailError;
use trail_core::store::TrailStore;

use crate::reconciler::Reconciler;
use crate::scope::TrailScope;

/// Receives every observed write inside a transaction.
#[allow(async_fn_in_trait)]
pub trait WriteObserver {
    async fn on_write(
        &mut self,
        entity: &dyn Auditable,
        action: WriteAction,
    ) -> Result<TrailEntry, TrailError>;
}

/// A reconciler bound to the scope of one transaction.
pub struct ObservedScope<'r, S> {
    reconciler: &'r Reconciler,
    scope: TrailScope<S>,
}

impl<'r, S: TrailStore> ObservedScope<'r, S> {
    #[must_use]
    pub fn new(reconciler: &'r Reconciler, store: S) -> Self {
        Self {
            reconciler,
            scope: TrailScope::new(store),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &TrailScope<S> {
        &self.scope
    }

    /// Release the store ahead of commit.
    #[must_use]
    pub fn finish(self) -> S {
        self.scope.finish()
    }
}

impl<S: TrailStore> WriteObserver for ObservedScope<'_, S> {
    async fn on_write(
        &mut self,
        entity: &dyn Auditable,
        action: WriteAction,
    ) -> Result<TrailEntry, TrailError> {
        self.reconciler.record(&mut self.scope, entity, action).await
    }
}
