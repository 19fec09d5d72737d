//! Trail database configuration.

use serde::{Deserialize, Serialize};

/// Special libSQL path for a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

fn default_path() -> String {
    "trail.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    /// Local libSQL database file, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

impl DbConfig {
    /// Whether the database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }
}
