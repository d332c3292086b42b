//! Pool statistics

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    total: usize,
    idle: usize,
    active: usize,
}

impl PoolStats {
    pub(crate) fn new(idle: usize, active: usize) -> Self {
        Self {
            total: idle + active,
            idle,
            active,
        }
    }

    /// Live connections owned by the pool or its checkouts.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Connections parked in the idle queue.
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Connections currently checked out.
    pub fn active(&self) -> usize {
        self.active
    }
}
