//! Single-flight guard for one pipeline stage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Idle/running flag shared by every entry point of a stage.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move from idle to running. Returns `false` if already running.
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Begin a run whose end is tied to the returned permit.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.try_begin().then(|| RunPermit {
            guard: self.clone(),
        })
    }
}

/// Marks the stage idle again when dropped, including on panic unwind.
#[derive(Debug)]
#[must_use = "the stage is released as soon as the permit is dropped"]
pub struct RunPermit {
    guard: RunGuard,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_exclusive() {
        let guard = RunGuard::new();
        assert!(guard.try_begin());
        assert!(!guard.try_begin());
        assert!(guard.is_running());
        guard.end();
        assert!(!guard.is_running());
        assert!(guard.try_begin());
    }

    #[test]
    fn test_permit_releases_on_drop() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.try_acquire().is_none());
        drop(permit);
        assert!(guard.try_acquire().is_some());
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn test_permit_moves_into_task() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire().unwrap();
        let handle = tokio::spawn(async move {
            let _permit = permit;
        });
        handle.await.unwrap();
        assert!(!guard.is_running());
    }
}
