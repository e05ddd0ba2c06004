//! Mutual exclusion for periodic runs.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Single-slot guard that keeps two runs of the same task from overlapping.
///
/// Each successful start gets a monotonically increasing generation number,
/// which is carried through the run's log lines.
#[derive(Debug, Default)]
pub struct RunGuard {
    slot: Mutex<()>,
    generation: AtomicU64,
}

/// Proof that a run is in progress. The slot is released on drop.
#[derive(Debug)]
pub struct RunTicket<'a> {
    _slot: MutexGuard<'a, ()>,
    generation: u64,
}

impl RunTicket<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a run is already in progress.
    pub fn try_start(&self) -> Option<RunTicket<'_>> {
        let slot = self.slot.try_lock().ok()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Some(RunTicket {
            _slot: slot,
            generation,
        })
    }

    /// Generation of the most recently started run (0 if none).
    pub fn last_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_start_is_refused() {
        let guard = RunGuard::new();
        let first = guard.try_start().unwrap();
        assert_eq!(first.generation(), 1);
        assert!(guard.is_running());
        assert!(guard.try_start().is_none());

        drop(first);
        assert!(!guard.is_running());

        let second = guard.try_start().unwrap();
        assert_eq!(second.generation(), 2);
        assert_eq!(guard.last_generation(), 2);
    }
}
