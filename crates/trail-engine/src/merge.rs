//! Action-merge state machine.
//!
//! Collapses a new mutation onto the entry already recorded for the same
//! entity in the same transaction. Pure: the reconciler applies the outcome.
//!
//! ```text
//! prior \ new   create      update      patch       delete
//! create        keep        keep        keep        retract
//! update        violation   keep        keep        → delete
//! patch         violation   → update    keep        → delete
//! delete        violation   → update    violation   keep
//! ```

use trail_core::enums::WriteAction;
use trail_core::errors::TrailError;

/// What to do with the prior entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Prior already describes the combined effect.
    Keep,
    /// Prior was a create that never became durable; remove it.
    Retract,
    /// Rewrite the prior entry's action.
    Replace(WriteAction),
}

/// Resolve `(prior, next)` into a merge outcome.
///
/// # Errors
///
/// `InvalidAction` when either side is a read; `InvariantViolation` for a
/// create after anything else, or a patch after a delete.
pub fn resolve(prior: WriteAction, next: WriteAction) -> Result<MergeOutcome, TrailError> {
    use WriteAction::{Create, Delete, Patch, Read, Update};

    match (prior, next) {
        (_, Read) | (Read, _) => Err(TrailError::InvalidAction { action: Read }),
        (Create, Create | Update | Patch)
        | (Update, Update | Patch)
        | (Patch, Patch)
        | (Delete, Delete) => Ok(MergeOutcome::Keep),
        (Create, Delete) => Ok(MergeOutcome::Retract),
        (Update | Patch, Delete) => Ok(MergeOutcome::Replace(Delete)),
        (Delete | Patch, Update) => Ok(MergeOutcome::Replace(Update)),
        (Delete, Patch) => Err(already_present(Patch, Delete)),
        (p, Create) => Err(already_present(Create, p)),
    }
}

fn already_present(next: WriteAction, prior: WriteAction) -> TrailError {
    TrailError::InvariantViolation(format!(
        "cannot record {next}: {prior} already present in this transaction"
    ))
}
