//! Pool configuration

use serde::{Deserialize, Serialize};

/// Sizing and warmup behavior of a [`ConnectionPool`](super::ConnectionPool).
///
/// Immutable once the pool is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    max_size: usize,
    init_size: usize,
    eager: bool,
}

impl PoolConfig {
    /// Create a configuration warming `init_size` connections out of an
    /// absolute cap of `max_size`.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero or `init_size` exceeds `max_size`.
    pub fn new(init_size: usize, max_size: usize) -> Self {
        assert!(max_size > 0, "max_size must be greater than 0");
        assert!(
            init_size <= max_size,
            "init_size ({init_size}) cannot exceed max_size ({max_size})"
        );
        Self {
            max_size,
            init_size,
            eager: false,
        }
    }

    /// Populate the warm target up front; `wait_for_warmup` then blocks
    /// until `init_size` connections exist.
    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// Absolute cap on live connections.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Target warm population.
    pub fn init_size(&self) -> usize {
        self.init_size
    }

    /// Whether the warm population is built at construction time.
    pub fn is_eager(&self) -> bool {
        self.eager
    }
}

impl Default for PoolConfig {
    /// Up to 30 connections, 10 warmed, lazily.
    fn default() -> Self {
        Self {
            max_size: 30,
            init_size: 10,
            eager: false,
        }
    }
}
