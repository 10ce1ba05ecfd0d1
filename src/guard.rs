//! Single-flight flag shared by the background checkers.

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds `flag` set for its lifetime and clears it on drop, including on unwind.
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    /// Sets `flag`, or returns `None` when it is already set.
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
