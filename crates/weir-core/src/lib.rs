//! weir-core - generic connection pooling runtime
//!
//! This crate provides the pieces a service needs to hand out long-lived
//! database connections without caring which driver produces them:
//!
//! - [`Connection`] - marker trait every driver handle implements
//! - [`ConnectionFactory`] - type-indexed registry of connection constructors
//! - [`ConnectionPool`] - bounded pool with warmup, timed acquisition, and
//!   recycling
//! - [`Manager`] - scoped checkout handle that returns its connection on drop
//!
//! Everything runs on plain OS threads; there is no async runtime.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use weir_core::{Connection, ConnectionFactory, ConnectionPool, PoolConfig};
//!
//! struct Probe;
//! impl Connection for Probe {}
//!
//! let factory = Arc::new(ConnectionFactory::new());
//! factory.register::<Probe, _>(|| Ok(Probe));
//!
//! let pool = ConnectionPool::<Probe>::new(factory, PoolConfig::new(1, 4).with_eager(true));
//! pool.wait_for_warmup();
//!
//! let conn = pool.acquire(Duration::from_secs(1))?;
//! drop(conn); // back into the pool
//! # Ok::<(), weir_core::ConnectionError>(())
//! ```

mod connection;
mod error;
mod factory;
mod manager;
pub mod pool;
mod sync;

pub use connection::Connection;
pub use error::{ConnectionError, ConnectionErrorKind, Result};
pub use factory::ConnectionFactory;
pub use manager::Manager;
pub use pool::{ConnectionPool, PoolConfig, PoolStats};
