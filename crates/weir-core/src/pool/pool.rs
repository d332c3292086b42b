//! Connection pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::connection::Connection;
use crate::error::{ConnectionError, Result};
use crate::factory::ConnectionFactory;
use crate::manager::Manager;
use crate::sync::{Latch, Semaphore};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Back-off between warmup construction attempts.
const WARMUP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A bounded pool of connections of type `T`.
///
/// The pool owns an idle queue served front-to-back and a capacity
/// semaphore that caps live connections at `max_size`. Eager pools build
/// `init_size` connections on background warmup threads and trip a one-shot
/// readiness latch once the target is reached; lazy pools are ready
/// immediately and manufacture connections on demand.
///
/// [`acquire`](Self::acquire) hands out a [`Manager`] - an exclusive,
/// scoped checkout whose drop pushes the connection to the back of the idle
/// queue and returns its capacity permit. Connections are never shared
/// between simultaneous callers.
pub struct ConnectionPool<T: Connection> {
    inner: Arc<PoolInner<T>>,
    stop: Arc<Latch>,
    warmup_workers: Vec<JoinHandle<()>>,
}

struct PoolInner<T> {
    config: PoolConfig,
    factory: Arc<ConnectionFactory>,
    /// Ready connections, served in FIFO order.
    idle: Mutex<VecDeque<Box<T>>>,
    /// Permits for live connections; every checkout holds one.
    capacity: Semaphore,
    /// Trips when the idle set first reaches the warm target.
    ready: Latch,
    /// Guards the one-time capacity top-up beyond `init_size`.
    expanded: AtomicBool,
    /// Checked-out connection count.
    active: AtomicUsize,
}

impl<T: Connection> ConnectionPool<T> {
    /// Create a pool backed by the constructor registered for `T` in
    /// `factory`.
    ///
    /// The capacity semaphore starts with `init_size` permits; the
    /// remainder up to `max_size` is added by the one-shot expansion once
    /// warmup completes (or immediately for lazy pools). Eager pools spawn
    /// one warmup thread per warm connection; each contributes a single
    /// connection and exits.
    pub fn new(factory: Arc<ConnectionFactory>, config: PoolConfig) -> Self {
        let inner = Arc::new(PoolInner {
            capacity: Semaphore::new(config.init_size()),
            idle: Mutex::new(VecDeque::with_capacity(config.max_size())),
            ready: Latch::new(),
            expanded: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            factory,
            config,
        });
        let stop = Arc::new(Latch::new());

        let mut warmup_workers = Vec::new();
        if inner.config.is_eager() && inner.config.init_size() > 0 {
            tracing::info!(
                init_size = inner.config.init_size(),
                max_size = inner.config.max_size(),
                "warming up connection pool"
            );
            warmup_workers.reserve(inner.config.init_size());
            for _ in 0..inner.config.init_size() {
                let inner = Arc::clone(&inner);
                let stop = Arc::clone(&stop);
                warmup_workers.push(thread::spawn(move || fill_pool(&inner, &stop)));
            }
        } else {
            inner.mark_warm();
        }

        Self {
            inner,
            stop,
            warmup_workers,
        }
    }

    /// Block until the warm population target has been reached.
    ///
    /// Idempotent and callable from any thread; returns immediately for
    /// lazy pools and on every call after the first completion.
    pub fn wait_for_warmup(&self) {
        self.inner.ready.wait();
    }

    /// Check out a connection, waiting up to `timeout` for capacity.
    ///
    /// A capacity permit is claimed first (bounded by `timeout`; expiry is a
    /// [`Timeout`](crate::ConnectionErrorKind::Timeout) error that consumes
    /// nothing). With the permit in hand, the idle queue front is preferred;
    /// an empty queue means the factory manufactures a fresh connection.
    /// Factory failure releases the permit and surfaces the error.
    pub fn acquire(&self, timeout: Duration) -> Result<Manager<T>> {
        let deadline = Instant::now() + timeout;
        if !self.inner.capacity.try_acquire_until(deadline) {
            return Err(ConnectionError::Timeout(
                "timed out waiting for a connection".into(),
            ));
        }

        // Permit in hand: prefer a pooled connection over creating one.
        if let Some(connection) = self.inner.idle.lock().pop_front() {
            tracing::debug!("acquired pooled connection");
            return Ok(self.wrap(connection));
        }

        match self.inner.factory.create::<T>() {
            Ok(connection) => {
                tracing::debug!("created connection on demand");
                Ok(self.wrap(connection))
            }
            Err(err) => {
                self.inner.capacity.release(1);
                Err(err)
            }
        }
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats::new(
            self.inner.idle.lock().len(),
            self.inner.active.load(Ordering::Relaxed),
        )
    }

    /// Wrap a connection in its checkout handle.
    ///
    /// The releaser holds a weak handle on the pool internals: a returned
    /// connection is re-queued and its permit released while the pool
    /// lives, and simply dropped once the pool is gone. Enqueue happens
    /// before the permit release so an acquirer woken by the permit finds
    /// the connection already in the queue.
    fn wrap(&self, connection: Box<T>) -> Manager<T> {
        self.inner.active.fetch_add(1, Ordering::Relaxed);
        let pool = Arc::downgrade(&self.inner);
        Manager::new(connection, move |returned| match pool.upgrade() {
            Some(pool) => {
                pool.active.fetch_sub(1, Ordering::Relaxed);
                pool.idle.lock().push_back(returned);
                pool.capacity.release(1);
            }
            None => {
                tracing::debug!("pool is gone; dropping returned connection");
            }
        })
    }
}

impl<T> PoolInner<T> {
    /// Run the one-shot ready and expansion transitions.
    fn mark_warm(&self) {
        if self.ready.set() {
            tracing::info!("connection pool ready");
        }
        if self.config.max_size() > self.config.init_size()
            && !self.expanded.swap(true, Ordering::AcqRel)
        {
            self.capacity
                .release(self.config.max_size() - self.config.init_size());
        }
    }
}

impl<T: Connection> Drop for ConnectionPool<T> {
    fn drop(&mut self) {
        self.stop.set();
        for worker in self.warmup_workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("warmup worker panicked");
            }
        }
    }
}

/// One-shot warmup worker: contribute a single connection, then exit.
///
/// The permit is held only across construction; failed attempts log, back
/// off for [`WARMUP_RETRY_DELAY`] (interruptibly), and retry until stop is
/// requested or a connection lands. A worker that loses its permit to a
/// concurrent acquirer exits without producing. The worker that observes
/// the idle queue reach the warm target runs the ready transitions.
fn fill_pool<T: Connection>(inner: &PoolInner<T>, stop: &Latch) {
    loop {
        if stop.is_set() {
            return;
        }

        let mut reached_target = false;
        if inner.capacity.try_acquire() {
            match inner.factory.create::<T>() {
                Ok(connection) => {
                    let mut idle = inner.idle.lock();
                    idle.push_back(connection);
                    reached_target = idle.len() == inner.config.init_size();
                    drop(idle);
                    inner.capacity.release(1);
                }
                Err(err) => {
                    tracing::error!(error = %err, "warmup connection attempt failed");
                    inner.capacity.release(1);
                    if stop.wait_for(WARMUP_RETRY_DELAY) {
                        return;
                    }
                    continue;
                }
            }
        }

        if reached_target {
            inner.mark_warm();
        }
        return;
    }
}
