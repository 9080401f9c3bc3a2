use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Shared pause/cancel handle for a run.
///
/// Workers consult it once per file at [`RunControl::checkpoint`]; nothing
/// in flight is ever interrupted. Clone is cheap and shares state.
#[derive(Clone, Debug, Default)]
pub struct RunControl {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Also releases workers parked on a pause.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.lock_paused();
        self.inner.resumed.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        *self.lock_paused() = true;
    }

    pub fn resume(&self) {
        *self.lock_paused() = false;
        self.inner.resumed.notify_all();
    }

    /// Flip the pause state, returning the new one.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = self.lock_paused();
        *paused = !*paused;
        if !*paused {
            self.inner.resumed.notify_all();
        }
        *paused
    }

    pub fn is_paused(&self) -> bool {
        *self.lock_paused()
    }

    /// Block while paused, then report whether the caller may go on.
    /// Returns `false` once cancellation was requested.
    pub fn checkpoint(&self) -> bool {
        let mut paused = self.lock_paused();
        while *paused && !self.is_cancelled() {
            paused = self
                .inner
                .resumed
                .wait(paused)
                .unwrap_or_else(|e| e.into_inner());
        }
        drop(paused);
        !self.is_cancelled()
    }

    fn lock_paused(&self) -> std::sync::MutexGuard<'_, bool> {
        // A bool cannot be left half-written, so a poisoned lock is still usable
        self.inner.paused.lock().unwrap_or_else(|e| e.into_inner())
    }
}
