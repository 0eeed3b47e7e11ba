//! Tunables shared by the bisection controller, the parties and the host.

use serde::{Deserialize, Serialize};

/// Default cap on preimage fetches for a single emulator operation.
pub const DEFAULT_MAX_FETCHES: usize = 4096;

/// Default distance in steps between cached party snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 1024;

/// Dispute tunables.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DisputeConfig {
    /// How many preimages one operation (loading a state, executing a step)
    /// may fetch before giving up.
    pub max_fetches: usize,

    /// Parties keep a snapshot every this many steps (and at every step they
    /// were asked about), so later claims do not re-run from the start.
    pub snapshot_interval: u64,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            max_fetches: DEFAULT_MAX_FETCHES,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}
