//! weir-postgres - PostgreSQL driver for the weir connection pool
//!
//! One socket, one worker thread. Callers enqueue requests from any thread;
//! the worker serializes them over a non-blocking libpq connection, detects
//! dead connections, reconnects within a deadline, and keeps the link warm
//! with a randomized `SELECT 1` heartbeat. At most one query is in flight
//! per connection at any time.
//!
//! The libpq linkage sits behind the `libpq` cargo feature; without it the
//! crate still builds, and the whole worker machinery runs against any
//! [`PgTransport`] implementation. With the feature enabled,
//! [`Postgres::connection_factory`] is the constructor to register with a
//! [`ConnectionFactory`](weir_core::ConnectionFactory):
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use weir_core::{ConnectionFactory, ConnectionPool, PoolConfig};
//! use weir_postgres::Postgres;
//!
//! let factory = Arc::new(ConnectionFactory::new());
//! factory.register::<Postgres, _>(Postgres::connection_factory);
//!
//! let pool = ConnectionPool::<Postgres>::new(factory, PoolConfig::new(2, 8).with_eager(true));
//! pool.wait_for_warmup();
//!
//! let db = pool.acquire(Duration::from_secs(3))?;
//! let rows = db
//!     .execute("SELECT id FROM users WHERE name = $1", vec!["ada".into()])
//!     .wait()?;
//! ```

pub mod config;
mod driver;
mod error;
#[cfg(feature = "libpq")]
mod ffi;
#[cfg(feature = "libpq")]
mod session;
mod transport;


pub use driver::{ErrorCallback, Postgres, QueryFuture, ResultCallback};
pub use error::{PgError, PgErrorKind};
#[cfg(feature = "libpq")]
pub use session::{PqResult, PqSession};
pub use transport::{FlushStatus, PgTransport, ResetPolling, ResultSet};
