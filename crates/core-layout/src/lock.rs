//! Two-tier mutex guarding the layout tree.
//!
//! Foreground callers (edits, queries) take [`PriorityMutex::lock_priority`];
//! deferred region delivery takes [`PriorityMutex::lock`] and steps aside
//! while any foreground caller waits. Not re-entrant.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct PriorityMutex<T> {
    inner: Mutex<T>,
    priority_waiters: AtomicUsize,
}

struct WaiterToken<'a>(&'a AtomicUsize);

impl Drop for WaiterToken<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> PriorityMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            priority_waiters: AtomicUsize::new(0),
        }
    }

    /// Background acquisition. Yields to foreground waiters.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            while self.priority_waiters.load(Ordering::Acquire) > 0 {
                std::thread::yield_now();
            }
            let guard = self.inner.lock();
            if self.priority_waiters.load(Ordering::Acquire) == 0 {
                return guard;
            }
            tracing::trace!(target: "layout.lock", "priority_handoff");
            MutexGuard::unlock_fair(guard);
        }
    }

    /// Foreground acquisition.
    pub fn lock_priority(&self) -> MutexGuard<'_, T> {
        self.priority_waiters.fetch_add(1, Ordering::AcqRel);
        let _token = WaiterToken(&self.priority_waiters);
        self.inner.lock()
    }

    pub fn priority_waiters(&self) -> usize {
        self.priority_waiters.load(Ordering::Acquire)
    }
}
