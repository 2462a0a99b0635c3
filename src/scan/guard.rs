// src/scan/guard.rs

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight token: at most one scan holds a permit at a time.
#[derive(Debug, Default)]
pub struct ScanGuard {
    running: AtomicBool,
}

/// Held for the duration of a scan. Dropping it releases the guard, on every
/// exit path including early returns and panics.
#[derive(Debug)]
pub struct ScanPermit<'a> {
    guard: &'a ScanGuard,
}

impl ScanGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a scan is already running; callers reject rather than wait.
    pub fn try_acquire(&self) -> Option<ScanPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let guard = ScanGuard::new();

        let permit = guard.try_acquire().expect("first acquire");
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn released_on_panic() {
        let guard = ScanGuard::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = guard.try_acquire().unwrap();
            panic!("scan blew up");
        }));

        assert!(outcome.is_err());
        assert!(!guard.is_running());
    }
}
