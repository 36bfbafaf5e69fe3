//! Cooperative cancellation.
//! A cloneable flag set by the Ctrl-C handler; the transfer loop checks it at
//! file boundaries and the device monitor checks it between polls.
//!
//! Notes:
//! - Relaxed atomics are sufficient for a one-way "stop" flag.
//! - `request()` is safe to call from signal handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative shutdown (idempotent).
    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check whether a shutdown has been requested.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `total`, waking early if shutdown is requested.
    /// Returns false when interrupted.
    pub fn sleep(&self, total: std::time::Duration) -> bool {
        const SLICE: std::time::Duration = std::time::Duration::from_millis(50);
        let deadline = std::time::Instant::now() + total;
        loop {
            if self.is_requested() {
                return false;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}
