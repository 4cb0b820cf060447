//! Liveness guard for the playback worker thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Keeps the shared live-thread count in sync with the worker thread's
/// lifetime, including exits by panic. A detached generation still counts
/// until it actually returns.
pub(super) struct WorkerThreadGuard {
    live_threads: Arc<AtomicUsize>,
}

impl WorkerThreadGuard {
    /// Mark the thread as alive.
    pub(super) fn new(live_threads: Arc<AtomicUsize>) -> Self {
        live_threads.fetch_add(1, Ordering::SeqCst);
        Self { live_threads }
    }
}

impl Drop for WorkerThreadGuard {
    fn drop(&mut self) {
        self.live_threads.fetch_sub(1, Ordering::SeqCst);
    }
}
