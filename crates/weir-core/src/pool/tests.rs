//! Tests for connection pool behavior

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::connection::Connection;
use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::factory::ConnectionFactory;

use super::config::PoolConfig;
use super::pool::ConnectionPool;

/// Mock connection carrying a creation id and a drop counter.
struct MockConnection {
    id: usize,
    drops: Arc<AtomicUsize>,
}

impl Connection for MockConnection {}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry with a counting mock factory installed.
struct Harness {
    factory: Arc<ConnectionFactory>,
    created: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let factory = Arc::new(ConnectionFactory::new());
    let created = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));

    let ids = Arc::clone(&created);
    let drops = Arc::clone(&dropped);
    factory.register::<MockConnection, _>(move || {
        Ok(MockConnection {
            id: ids.fetch_add(1, Ordering::SeqCst),
            drops: Arc::clone(&drops),
        })
    });

    Harness {
        factory,
        created,
        dropped,
    }
}

// =============================================================================
// PoolConfig
// =============================================================================

#[test]
#[should_panic(expected = "max_size must be greater than 0")]
fn config_rejects_zero_max_size() {
    PoolConfig::new(0, 0);
}

#[test]
#[should_panic(expected = "init_size (5) cannot exceed max_size (2)")]
fn config_rejects_init_above_max() {
    PoolConfig::new(5, 2);
}

#[test]
fn config_serialization_round_trips() {
    let config = PoolConfig::new(2, 10).with_eager(true);
    let json = serde_json::to_string(&config).expect("serialize");
    let back: PoolConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, config);
}

// =============================================================================
// Warmup
// =============================================================================

#[test]
fn eager_single_slot_warms_acquires_and_recycles() {
    let h = harness();
    let pool = ConnectionPool::<MockConnection>::new(
        Arc::clone(&h.factory),
        PoolConfig::new(1, 1).with_eager(true),
    );
    pool.wait_for_warmup();
    assert_eq!(pool.stats().idle(), 1);

    let conn = pool.acquire(Duration::from_secs(1)).expect("first acquire");
    assert_eq!(conn.id, 0);
    assert_eq!(pool.stats().active(), 1);
    drop(conn);

    let conn = pool.acquire(Duration::from_secs(1)).expect("second acquire");
    assert_eq!(conn.id, 0, "warm connection is reused, not re-created");
    drop(conn);

    assert_eq!(pool.stats().idle(), 1);
    assert_eq!(h.created.load(Ordering::SeqCst), 1);
}

#[test]
fn lazy_pool_is_immediately_ready() {
    let h = harness();
    let pool =
        ConnectionPool::<MockConnection>::new(Arc::clone(&h.factory), PoolConfig::new(2, 4));

    // Must not block even though nothing was warmed.
    pool.wait_for_warmup();
    assert_eq!(pool.stats().idle(), 0);

    let _conn = pool.acquire(Duration::from_secs(1)).expect("on-demand create");
    assert_eq!(h.created.load(Ordering::SeqCst), 1);
}

#[test]
fn warmup_completion_is_monotonic() {
    let h = harness();
    let pool = Arc::new(ConnectionPool::<MockConnection>::new(
        Arc::clone(&h.factory),
        PoolConfig::new(2, 2).with_eager(true),
    ));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.wait_for_warmup())
        })
        .collect();
    for waiter in waiters {
        waiter.join().expect("warmup waiter");
    }

    // Every later call returns immediately.
    pool.wait_for_warmup();
    pool.wait_for_warmup();
    assert_eq!(pool.stats().idle(), 2);
}

#[test]
fn warmup_retries_failed_construction() {
    let factory = Arc::new(ConnectionFactory::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));

    let tries = Arc::clone(&attempts);
    let drops = Arc::clone(&dropped);
    factory.register::<MockConnection, _>(move || {
        if tries.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(ConnectionError::ConnectionFailed("not yet".into()));
        }
        Ok(MockConnection {
            id: 0,
            drops: Arc::clone(&drops),
        })
    });

    let pool =
        ConnectionPool::<MockConnection>::new(factory, PoolConfig::new(1, 1).with_eager(true));

    // Two failures back off one second each before the third succeeds.
    pool.wait_for_warmup();
    assert_eq!(pool.stats().idle(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Acquisition
// =============================================================================

#[test]
fn saturated_pool_times_out_then_recovers() {
    let h = harness();
    let pool = ConnectionPool::<MockConnection>::new(
        Arc::clone(&h.factory),
        PoolConfig::new(1, 1).with_eager(true),
    );
    pool.wait_for_warmup();

    let held = pool.acquire(Duration::from_secs(1)).expect("first acquire");

    let err = pool
        .acquire(Duration::from_millis(100))
        .expect_err("pool is saturated");
    assert_eq!(err.kind(), ConnectionErrorKind::Timeout);

    drop(held);
    pool.acquire(Duration::from_secs(1))
        .expect("released connection is available again");
}

#[test]
fn acquire_without_registered_factory_fails() {
    let factory = Arc::new(ConnectionFactory::new());
    let pool = ConnectionPool::<MockConnection>::new(factory, PoolConfig::new(0, 2));

    let err = pool
        .acquire(Duration::from_millis(100))
        .expect_err("nothing registered for this type");
    assert_eq!(err.kind(), ConnectionErrorKind::FactoryNotRegistered);
    assert!(
        err.message().contains("MockConnection"),
        "got: {}",
        err.message()
    );
}

#[test]
fn failed_creation_returns_capacity() {
    let factory = Arc::new(ConnectionFactory::new());
    factory.register::<MockConnection, _>(|| {
        Err(ConnectionError::ConnectionFailed("refused".into()))
    });
    let pool = ConnectionPool::<MockConnection>::new(factory, PoolConfig::new(0, 1));

    // If the permit leaked, the second attempt would time out instead of
    // reaching the factory again.
    for _ in 0..2 {
        let err = pool
            .acquire(Duration::from_millis(100))
            .expect_err("factory always fails");
        assert_eq!(err.kind(), ConnectionErrorKind::ConnectionFailed);
    }
}

#[test]
fn idle_connections_are_served_fifo() {
    let h = harness();
    let pool =
        ConnectionPool::<MockConnection>::new(Arc::clone(&h.factory), PoolConfig::new(0, 2));

    let first = pool.acquire(Duration::from_secs(1)).expect("create first");
    let second = pool.acquire(Duration::from_secs(1)).expect("create second");
    let (first_id, second_id) = (first.id, second.id);
    drop(first);
    drop(second);

    let replay = pool.acquire(Duration::from_secs(1)).expect("front of queue");
    assert_eq!(replay.id, first_id);
    let replay = pool.acquire(Duration::from_secs(1)).expect("back of queue");
    assert_eq!(replay.id, second_id);
}

#[test]
fn concurrent_checkouts_never_exceed_max_size() {
    let h = harness();
    let pool = Arc::new(ConnectionPool::<MockConnection>::new(
        Arc::clone(&h.factory),
        PoolConfig::new(1, 3).with_eager(true),
    ));
    pool.wait_for_warmup();

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..20 {
                    let conn = pool.acquire(Duration::from_secs(2)).expect("acquire");
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    current.fetch_sub(1, Ordering::SeqCst);
                    drop(conn);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("checkout worker");
    }

    assert!(peak.load(Ordering::SeqCst) <= 3, "peak {}", peak.load(Ordering::SeqCst));
    assert!(h.created.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.stats().active(), 0);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn dropping_the_pool_destroys_idle_and_orphans_checkouts() {
    let h = harness();
    let pool = ConnectionPool::<MockConnection>::new(
        Arc::clone(&h.factory),
        PoolConfig::new(2, 2).with_eager(true),
    );
    pool.wait_for_warmup();

    let held = pool.acquire(Duration::from_secs(1)).expect("checkout");
    drop(pool);

    // The idle connection died with the pool.
    assert_eq!(h.dropped.load(Ordering::SeqCst), 1);

    // The orphaned checkout is destroyed instead of re-queued.
    drop(held);
    assert_eq!(h.dropped.load(Ordering::SeqCst), 2);
}
