// 7.0 config.rs: all settings in one place. structural limits the engine
// enforces on top of per-operation validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // Maximum tranches one ledger may hold
    pub max_tranches_per_ledger: usize,
    // Maximum legs a custom spread may hold
    pub max_legs_per_spread: usize,
    // Maximum exit requests in one batch
    pub max_exit_batch: usize,
    // Maximum events to keep in the audit log
    pub max_events: usize,
    // Print events as they happen
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tranches_per_ledger: 64,
            max_legs_per_spread: 8,
            max_exit_batch: 16,
            max_events: 100_000,
            verbose: false,
        }
    }
}
