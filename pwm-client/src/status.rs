//! Shared sync status: in-flight flag, last outcome and current phase.
//!
//! The in-flight flag is the single admission gate for syncs. Admission is
//! one compare-and-swap, and the returned [`SyncGuard`] releases the flag
//! when dropped, including when a sync future is cancelled.

use pwm_core::SyncPhase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Status flags read by front ends and written by the sync client.
///
/// Nothing here is persisted. A fresh status reports "not in progress" and
/// "last sync successful".
#[derive(Debug)]
pub struct SyncStatus {
    in_flight: AtomicBool,
    last_successful: AtomicBool,
    phase: Mutex<SyncPhase>,
}

impl SyncStatus {
    /// Create a fresh status.
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last_successful: AtomicBool::new(true),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// The process-wide status shared by every client that opts into it.
    pub fn global() -> Arc<SyncStatus> {
        static GLOBAL: OnceLock<Arc<SyncStatus>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SyncStatus::new())))
    }

    /// Try to admit a sync. Returns `None` if one is already running.
    pub fn try_begin(&self) -> Option<SyncGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncGuard { status: self })
    }

    /// Whether a sync is running.
    pub fn is_sync_in_progress(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Outcome of the last sync that got past its config check.
    pub fn was_last_sync_successful(&self) -> bool {
        self.last_successful.load(Ordering::SeqCst)
    }

    /// Current phase of the running sync (`Idle` when none).
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, success: bool) {
        self.last_successful.store(success, Ordering::SeqCst);
    }

    pub(crate) fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of admission. Dropping it resets the phase and clears in-flight.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    status: &'a SyncStatus,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.status.set_phase(SyncPhase::Idle);
        self.status.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status() {
        let status = SyncStatus::new();
        assert!(!status.is_sync_in_progress());
        assert!(status.was_last_sync_successful());
        assert_eq!(status.phase(), SyncPhase::Idle);
    }

    #[test]
    fn second_admission_is_rejected_until_guard_drops() {
        let status = SyncStatus::new();
        let guard = status.try_begin().expect("first admission");
        assert!(status.is_sync_in_progress());
        assert!(status.try_begin().is_none());

        drop(guard);
        assert!(!status.is_sync_in_progress());
        assert!(status.try_begin().is_some());
    }

    #[test]
    fn guard_drop_resets_phase() {
        let status = SyncStatus::new();
        {
            let _guard = status.try_begin().unwrap();
            status.set_phase(SyncPhase::Pushing);
            assert_eq!(status.phase(), SyncPhase::Pushing);
        }
        assert_eq!(status.phase(), SyncPhase::Idle);
    }

    #[test]
    fn concurrent_admission_admits_exactly_one() {
        let status = Arc::new(SyncStatus::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let status = Arc::clone(&status);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Leak the guard so no thread releases the flag.
                    status.try_begin().map(std::mem::forget).is_some()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn outcome_is_recorded() {
        let status = SyncStatus::new();
        status.record(false);
        assert!(!status.was_last_sync_successful());
        status.record(true);
        assert!(status.was_last_sync_successful());
    }

    #[test]
    fn global_is_shared() {
        assert!(Arc::ptr_eq(&SyncStatus::global(), &SyncStatus::global()));
    }
}
