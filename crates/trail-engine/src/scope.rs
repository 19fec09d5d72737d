//! Transaction scope: the store handle plus the in-flight registry of one
//! transaction.
//!
//! The surrounding transaction owner creates a scope after `BEGIN`, passes it
//! to every `record` call, then either calls [`TrailScope::finish`] before
//! committing or simply drops it on rollback. In both cases the registry goes
//! away with the transaction.

use trail_core::store::TrailStore;

use crate::in_flight::InFlightRegistry;

pub struct TrailScope<S> {
    pub(crate) store: S,
    pub(crate) in_flight: InFlightRegistry,
}

impl<S: TrailStore> TrailScope<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            in_flight: InFlightRegistry::new(),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// End the scope ahead of commit, discarding the registry.
    #[must_use]
    pub fn finish(self) -> S {
        let Self { store, in_flight } = self;
        tracing::trace!(entries = in_flight.len(), "trail scope finished");
        store
    }
}
