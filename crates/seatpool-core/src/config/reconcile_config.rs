//! Reconciliation scanner configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Name recorded as `released_by` for heals.
    pub actor: String,
    /// Worker threads for multi-organization sweeps. 0 = one per core.
    pub parallelism: usize,
    /// Write each report to the report log when one is attached.
    pub persist_reports: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            actor: "reconciler".to_string(),
            parallelism: 0,
            persist_reports: true,
        }
    }
}
