//! Error taxonomy for trail reconciliation and storage.
//!
//! `TrailError` is what the engine surfaces to the interception layer; every
//! variant is meant to abort the surrounding transaction. `StoreError` is the
//! backend-neutral failure type of the `TrailStore` contract. Backend crates
//! (e.g. `trail-db`) convert their own errors into it.

use thiserror::Error;
use uuid::Uuid;

use crate::enums::WriteAction;

/// Errors raised while recording a mutation.
#[derive(Debug, Error)]
pub enum TrailError {
    /// The store is not running inside a transaction.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// No id could be extracted for an action that requires one.
    #[error("Cannot record {action} for {entity_type}: entity id is missing")]
    MissingIdentity {
        entity_type: String,
        action: WriteAction,
    },

    /// The action-merge rules or the single-current rule were broken.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An in-flight entry belongs to another transaction.
    #[error(
        "Transaction mismatch for {entity_type} {entity_id}: expected {expected}, found {}",
        .found.map_or_else(|| "none".to_string(), |t| t.to_string())
    )]
    TransactionMismatch {
        entity_type: String,
        entity_id: String,
        expected: Uuid,
        found: Option<Uuid>,
    },

    /// An action that must never reach the engine.
    #[error("Invalid action: {action}")]
    InvalidAction { action: WriteAction },

    /// The store adapter failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from trail store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// A constraint or concurrent-modification conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Expected a row but none was found.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in the store).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
