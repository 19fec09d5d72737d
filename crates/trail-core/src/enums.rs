//! Action kinds recorded in the audit trail.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! which is also the representation stored in SQL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WriteAction
// ---------------------------------------------------------------------------

/// Kind of mutation observed on an audited entity.
///
/// `Read` exists so that interceptors can forward every observed access
/// through one type; the reconciliation engine rejects it.
///
/// ```text
/// (absent) → create → update ⇄ delete
///                   → patch  → delete
/// create is never reachable again once update, patch or delete is recorded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Create,
    Update,
    Patch,
    Delete,
    Read,
}

impl WriteAction {
    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Read => "read",
        }
    }

    /// Whether this action mutates the entity.
    #[must_use]
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
