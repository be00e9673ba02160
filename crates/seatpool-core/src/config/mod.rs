pub mod engine_config;
pub mod policy_config;
pub mod reconcile_config;
pub mod storage_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use engine_config::EngineConfig;
pub use policy_config::{PolicyConfig, TierPolicyEntry};
pub use reconcile_config::ReconcileConfig;
pub use storage_config::StorageConfig;

use crate::errors::{AllocError, AllocResult};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SeatPoolConfig {
    pub policy: PolicyConfig,
    pub engine: EngineConfig,
    pub reconcile: ReconcileConfig,
    pub storage: StorageConfig,
}

impl SeatPoolConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load and validate config from a TOML file.
    pub fn from_file(path: &Path) -> AllocResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AllocError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&raw)
            .map_err(|e| AllocError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded seatpool config");
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> AllocResult<()> {
        self.policy.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}
