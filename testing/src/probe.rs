//! Concurrency probe.
//!
//! A [`ConcurrencyProbe`] is shared by every item of a run. Each item enters
//! the probe when it starts and leaves it when it finishes (including by
//! panic), so a test can check from the work's side of the fence how many
//! items were active together and in which order they started.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ProbeState {
    active: usize,
    peak: usize,
    started: Vec<usize>,
    finished: Vec<usize>,
}

/// Records start/finish events of work items.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl ConcurrencyProbe {
    /// Creates an empty probe.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `index` as started. The item counts as active until the
    /// returned guard is dropped.
    pub fn enter(&self, index: usize) -> ProbeGuard {
        let mut state = self.lock();
        state.active += 1;
        state.peak = state.peak.max(state.active);
        state.started.push(index);
        ProbeGuard {
            probe: self.clone(),
            index,
        }
    }

    fn leave(&self, index: usize) {
        let mut state = self.lock();
        state.active -= 1;
        state.finished.push(index);
    }

    /// Items active right now.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Highest number of items that were active at the same time.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    /// Indices in the order their items started.
    pub fn started(&self) -> Vec<usize> {
        self.lock().started.clone()
    }

    /// Indices in the order their items finished.
    pub fn finished(&self) -> Vec<usize> {
        self.lock().finished.clone()
    }

    /// Number of times `index` was started.
    pub fn start_count(&self, index: usize) -> usize {
        self.lock().started.iter().filter(|&&i| i == index).count()
    }
}

/// Keeps an item active in its probe until dropped.
#[derive(Debug)]
pub struct ProbeGuard {
    probe: ConcurrencyProbe,
    index: usize,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.probe.leave(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_active_and_peak() {
        let probe = ConcurrencyProbe::new();
        let first = probe.enter(0);
        let second = probe.enter(1);
        assert_eq!(probe.active(), 2);

        drop(first);
        let third = probe.enter(2);
        assert_eq!(probe.peak(), 2);

        drop(second);
        drop(third);
        assert_eq!(probe.active(), 0);
        assert_eq!(probe.started(), vec![0, 1, 2]);
        assert_eq!(probe.finished(), vec![0, 1, 2]);
        assert_eq!(probe.start_count(1), 1);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let probe = ConcurrencyProbe::new();
        let inner = probe.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.enter(9);
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(probe.active(), 0);
        assert_eq!(probe.finished(), vec![9]);
    }
}
