//! # trail-config
//!
//! Layered configuration loading for the audit trail using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TRAIL_*` prefix, `__` as separator)
//! 2. Project-level `.trail/config.toml`
//! 3. User-level `~/.config/trail/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TRAIL_DB__PATH` -> `db.path`,
//! `TRAIL_RECONCILE__ALLOW_PATCH` -> `reconcile.allow_patch`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use trail_config::TrailConfig;
//!
//! let config = TrailConfig::load_with_dotenv().expect("config");
//! println!("trail database: {}", config.db.path);
//! ```

mod db;
mod error;
mod reconcile;

pub use db::{DbConfig, IN_MEMORY_PATH};
pub use error::ConfigError;
pub use reconcile::ReconcileConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrailConfig {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl TrailConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer more providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".trail/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("TRAIL_").split("__"))
    }

    /// Reject values that would only fail later at open time.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty database path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "db.path".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trail").join("config.toml"))
    }

    /// Load `.env` from the workspace root, walking up from
    /// `CARGO_MANIFEST_DIR`. Silently does nothing if none is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}
