//! Internal synchronization primitives
//!
//! A counting semaphore with timed acquisition and a one-shot latch. Both
//! are built on `parking_lot`; the standard library has no counting
//! semaphore and `std`'s condvars poison.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counting semaphore.
///
/// Permits gate how many live connections a pool may hold; releases wake
/// waiters blocked in [`try_acquire_until`](Self::try_acquire_until).
pub(crate) struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Take one permit if one is available right now.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Take one permit, waiting until `deadline` for one to appear.
    pub(crate) fn try_acquire_until(&self, deadline: Instant) -> bool {
        let mut permits = self.permits.lock();
        loop {
            if *permits > 0 {
                *permits -= 1;
                return true;
            }
            let timed_out = self.available.wait_until(&mut permits, deadline).timed_out();
            if timed_out && *permits == 0 {
                return false;
            }
        }
    }

    /// Return `n` permits and wake waiters.
    pub(crate) fn release(&self, n: usize) {
        let mut permits = self.permits.lock();
        *permits += n;
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }
}

/// One-shot latch.
///
/// `set` is idempotent and wakes every waiter; once fired the latch stays
/// fired, so waiters observe monotonic progress.
pub(crate) struct Latch {
    fired: Mutex<bool>,
    wakeup: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }

    /// Trip the latch. Returns true only for the call that made the
    /// transition.
    pub(crate) fn set(&self) -> bool {
        let mut fired = self.fired.lock();
        if *fired {
            return false;
        }
        *fired = true;
        self.wakeup.notify_all();
        true
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.fired.lock()
    }

    /// Block until the latch fires.
    pub(crate) fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.wakeup.wait(&mut fired);
        }
    }

    /// Wait up to `timeout` for the latch. Returns whether it has fired.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.fired.lock();
        while !*fired {
            if self.wakeup.wait_until(&mut fired, deadline).timed_out() {
                return *fired;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn semaphore_counts_permits() {
        let sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        sem.release(1);
        assert!(sem.try_acquire());
    }

    #[test]
    fn semaphore_timed_wait_expires() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(!sem.try_acquire_until(start + Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn semaphore_release_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.try_acquire_until(Instant::now() + Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        sem.release(1);
        assert!(waiter.join().expect("waiter thread"));
    }

    #[test]
    fn latch_set_is_one_shot() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert!(latch.set());
        assert!(!latch.set());
        assert!(latch.is_set());
        latch.wait(); // already fired; must not block
    }

    #[test]
    fn latch_wakes_waiters() {
        let latch = Arc::new(Latch::new());
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(20));
        latch.set();
        waiter.join().expect("waiter thread");
    }

    #[test]
    fn latch_wait_for_reports_timeout() {
        let latch = Latch::new();
        assert!(!latch.wait_for(Duration::from_millis(30)));
        latch.set();
        assert!(latch.wait_for(Duration::from_millis(30)));
    }
}
