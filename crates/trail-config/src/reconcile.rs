//! Reconciliation engine settings.

use serde::{Deserialize, Serialize};

const fn default_allow_patch() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Whether PATCH mutations are recorded. When disabled, a PATCH reaching
    /// the engine is rejected as an invalid action.
    #[serde(default = "default_allow_patch")]
    pub allow_patch: bool,

    /// Device written when the device provider has none.
    #[serde(default)]
    pub default_device: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            allow_patch: default_allow_patch(),
            default_device: String::new(),
        }
    }
}
