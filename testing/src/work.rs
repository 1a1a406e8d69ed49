//! Scripted work items.
//!
//! [`ScriptedWork`] implements both [`Work`] and [`BlockingWork`]: it
//! reports to a [`ConcurrencyProbe`], waits for a per-index delay, and then
//! succeeds, fails, or panics as scripted.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bounded_runner::{BlockingWork, ItemError, Work};

use crate::probe::ConcurrencyProbe;

/// Kind reported by scripted failures.
pub const SCRIPTED_FAILURE: &str = "ScriptedFailure";

type DelayFn = dyn Fn(usize) -> Duration + Send + Sync;

/// The delay used by the `run-concurrently` demo: `2000 + index * 100` ms.
pub fn staggered_delay(index: usize) -> Duration {
    Duration::from_millis(2000 + index as u64 * 100)
}

/// Work whose timing and outcome are decided per index.
#[derive(Clone)]
pub struct ScriptedWork {
    probe: ConcurrencyProbe,
    delay: Arc<DelayFn>,
    failing: Arc<BTreeSet<usize>>,
    panicking: Arc<BTreeSet<usize>>,
}

impl ScriptedWork {
    /// Work that succeeds immediately for every index.
    pub fn new(probe: ConcurrencyProbe) -> Self {
        Self {
            probe,
            delay: Arc::new(|_| Duration::ZERO),
            failing: Arc::new(BTreeSet::new()),
            panicking: Arc::new(BTreeSet::new()),
        }
    }

    /// Waits `delay(index)` before finishing each item.
    pub fn with_delay(mut self, delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    /// Waits the same duration for every item.
    pub fn with_fixed_delay(self, delay: Duration) -> Self {
        self.with_delay(move |_| delay)
    }

    /// Items at these indices return a [`SCRIPTED_FAILURE`] error.
    pub fn failing_at(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing = Arc::new(indices.into_iter().collect());
        self
    }

    /// Items at these indices panic.
    pub fn panicking_at(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.panicking = Arc::new(indices.into_iter().collect());
        self
    }

    /// The probe this work reports to.
    pub fn probe(&self) -> &ConcurrencyProbe {
        &self.probe
    }

    fn outcome(&self, index: usize) -> Result<(), ItemError> {
        if self.panicking.contains(&index) {
            panic!("scripted panic at index {}", index);
        }
        if self.failing.contains(&index) {
            return Err(ItemError::new(
                SCRIPTED_FAILURE,
                format!("item {} failed", index),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScriptedWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedWork")
            .field("failing", &self.failing)
            .field("panicking", &self.panicking)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Work for ScriptedWork {
    async fn run(&self, index: usize) -> Result<(), ItemError> {
        let _guard = self.probe.enter(index);
        let delay = (self.delay)(index);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        self.outcome(index)
    }
}

impl BlockingWork for ScriptedWork {
    fn run(&self, index: usize) -> Result<(), ItemError> {
        let _guard = self.probe.enter(index);
        let delay = (self.delay)(index);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.outcome(index)
    }
}
