//! Debug-build verification of single-threaded session ownership.
//!
//! A transport session holds lock-free mutable state and must only ever be
//! touched from one logical executor at a time. Release builds rely on the
//! ownership contract; debug builds bind the checker to the first thread
//! that touches it and panic on any access from another thread.

#[cfg(debug_assertions)]
use std::thread::ThreadId;

/// Asserts single-threaded access in debug builds; zero-sized in release.
#[derive(Debug, Default)]
pub struct ThreadChecker {
    #[cfg(debug_assertions)]
    owner: Option<ThreadId>,
}

impl ThreadChecker {
    /// An unbound checker; binds to the first thread that calls [`check`](Self::check).
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert the calling thread owns this checker.
    #[cfg(debug_assertions)]
    pub fn check(&mut self) {
        let current = std::thread::current().id();
        match self.owner {
            None => self.owner = Some(current),
            Some(owner) => {
                assert_eq!(
                    owner, current,
                    "session accessed from a second thread; sessions are single-owner"
                );
            }
        }
    }

    /// No-op in release builds.
    #[cfg(not(debug_assertions))]
    #[inline]
    pub fn check(&mut self) {}

    /// Release ownership, e.g. when handing the session to another executor.
    #[cfg(debug_assertions)]
    pub fn detach(&mut self) {
        self.owner = None;
    }

    /// No-op in release builds.
    #[cfg(not(debug_assertions))]
    #[inline]
    pub fn detach(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_access_is_fine() {
        let mut checker = ThreadChecker::new();
        checker.check();
        checker.check();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn cross_thread_access_panics() {
        let mut checker = ThreadChecker::new();
        checker.check();

        let handle = std::thread::spawn(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| checker.check()))
        });
        let result = handle.join().expect("spawned thread joins");
        assert!(result.is_err(), "second thread must be rejected");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn detach_allows_new_owner() {
        let mut checker = ThreadChecker::new();
        checker.check();
        checker.detach();

        let handle = std::thread::spawn(move || {
            checker.check();
        });
        handle.join().expect("new owner accepted");
    }
}
