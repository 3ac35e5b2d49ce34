//! a cancellable wait, used to stop the refresh loop.

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

/// a one-way stop signal, shared between the refresh loop and a signal handler.
#[derive(Clone, Debug, Default)]
pub struct Stop {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

// === impl Stop ===

impl Stop {
    pub fn new() -> Self {
        Self::default()
    }

    /// requests a stop, waking any waiter.
    pub fn trigger(&self) {
        let (stopped, wake) = &*self.inner;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (stopped, _) = &*self.inner;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// sleeps for `timeout`, or until a stop is requested.
    ///
    /// returns true if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (stopped, wake) = &*self.inner;
        let guard = stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
