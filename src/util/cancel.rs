// Scanner111 - util/cancel.rs
//
// Cooperative cancellation handle shared between the orchestrator, the
// analyzers, and background threads (cache sweeper, watcher).
//
// Analyzers poll `is_cancelled()` between units of work; long sleeps use
// `wait_cancelled_timeout` so a cancel request is observed promptly instead
// of after a full sleep interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Cloneable cancellation handle. All clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl CancellationHandle {
    /// Create a handle in the not-cancelled state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Returns true once `cancel()` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation and wake all blocked waiters.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        // Acquire the lock so a waiter between its flag check and its wait
        // cannot miss the notification.
        let _guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.inner.cond.notify_all();
    }

    /// Block until cancellation or `timeout` elapses.
    ///
    /// Returns true if cancellation was observed, false on timeout.
    pub fn wait_cancelled_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, result) = self
                .inner
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = g;
            if result.timed_out() {
                return self.is_cancelled();
            }
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}
