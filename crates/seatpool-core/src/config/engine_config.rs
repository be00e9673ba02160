//! Allocation engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AllocError, AllocResult};

/// Retry, timeout, and identity settings for the allocation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name recorded as `released_by` in release history.
    pub actor: String,
    /// Attempts per operation before ConcurrentModification.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Per-operation deadline across all attempts; also the SQLite busy timeout.
    pub store_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            actor: "allocation-engine".to_string(),
            max_attempts: 5,
            backoff_base_ms: 10,
            backoff_max_ms: 250,
            store_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.max_attempts == 0 {
            return Err(AllocError::Config("engine.max_attempts must be at least 1".into()));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(AllocError::Config(format!(
                "engine.backoff_base_ms ({}) exceeds engine.backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        if self.actor.trim().is_empty() {
            return Err(AllocError::Config("engine.actor must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn backoff_bounds_checked() {
        let config = EngineConfig {
            backoff_base_ms: 500,
            backoff_max_ms: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
