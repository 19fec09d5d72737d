//! # trail-engine
//!
//! Reconciles observed entity mutations into the audit trail.
//!
//! A [`Reconciler`] is built once with its providers and config. For each
//! database transaction the caller wraps a store in a [`TrailScope`] (or an
//! [`ObservedScope`]) and records every mutation through it. Within one
//! correlation id an entity ends up with at most one entry; across
//! transactions the latest entry per entity stays flagged current.
//!
//! ```text
//! BEGIN ─► TrailScope::new(store) ─► record(..) × n ─► finish() ─► COMMIT
//!                                         │
//!                                   error ┴─► drop scope ─► ROLLBACK
//! ```

pub mod in_flight;
pub mod merge;
pub mod observer;
pub mod reconciler;
pub mod scope;

pub use observer::{ObservedScope, WriteObserver};
pub use reconciler::{Providers, Reconciler};
pub use scope::TrailScope;
