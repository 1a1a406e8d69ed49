//! Run state and results.
//!
//! [`RunState`] is the slot-refill state machine shared by every runner.
//! It is owned by the scheduling context for the length of one run and is
//! never touched by work items; completions are reported back to it as
//! messages. Every transition checks the scheduling guarantees and reports
//! a broken one as [`RunnerError::InvariantViolation`].

use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{ItemError, RunnerError};

/// Reason why a run reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    /// Every item was dispatched and completed (success or failure)
    AllCompleted,
    /// Cancellation stopped dispatch before every item was started
    Cancelled,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllCompleted => write!(f, "AllCompleted"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A failed item and its captured error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Index of the item that failed
    pub index: usize,
    /// Error returned (or panic raised) by the item
    pub error: ItemError,
}

impl ItemFailure {
    /// Creates a new ItemFailure.
    pub fn new(index: usize, error: ItemError) -> Self {
        Self { index, error }
    }
}

/// Final accounting of a run.
///
/// Item failures never abort a run: every dispatched item runs to
/// completion and failures are collected here in the order the scheduler
/// observed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of items in the run
    pub total_runs: usize,
    /// Items that finished, successfully or not
    pub completed_count: usize,
    /// Failed items in completion order
    pub failures: Vec<ItemFailure>,
    /// Items never dispatched because the run was cancelled
    pub skipped: usize,
    /// Highest number of simultaneously active items seen by the scheduler
    pub peak_active: usize,
    /// Why the run ended
    pub reason: CompletionReason,
}

impl RunResult {
    /// Result of a run with no items.
    pub fn empty() -> Self {
        Self {
            total_runs: 0,
            completed_count: 0,
            failures: Vec::new(),
            skipped: 0,
            peak_active: 0,
            reason: CompletionReason::AllCompleted,
        }
    }

    /// Number of items that completed without error.
    pub fn success_count(&self) -> usize {
        self.completed_count.saturating_sub(self.failures.len())
    }

    /// Number of items that failed.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if every item ran and none failed.
    pub fn all_succeeded(&self) -> bool {
        self.reason == CompletionReason::AllCompleted && self.failures.is_empty()
    }

    /// Returns true if any item failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns true if cancellation left items undispatched.
    pub fn is_cancelled(&self) -> bool {
        self.reason == CompletionReason::Cancelled
    }

    /// Indices that were never dispatched. Dispatch is ascending, so these
    /// are always the tail of the index range.
    pub fn skipped_indices(&self) -> Range<usize> {
        self.total_runs.saturating_sub(self.skipped)..self.total_runs
    }

    /// Looks up the failure recorded for `index`, if any.
    pub fn failure_for(&self, index: usize) -> Option<&ItemFailure> {
        self.failures.iter().find(|failure| failure.index == index)
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Mutable scheduling state for a single run.
#[derive(Debug)]
pub struct RunState {
    total_runs: usize,
    concurrency: usize,
    next_index: usize,
    active_count: usize,
    completed_count: usize,
    peak_active: usize,
    in_flight: BTreeSet<usize>,
    failures: Vec<ItemFailure>,
    cancelled: bool,
}

impl RunState {
    /// Creates the state for a run, rejecting an invalid config before
    /// anything can be dispatched.
    pub fn new(config: &RunConfig) -> Result<Self, RunnerError> {
        config.validate()?;
        Ok(Self {
            total_runs: config.total_runs,
            concurrency: config.concurrency,
            next_index: 0,
            active_count: 0,
            completed_count: 0,
            peak_active: 0,
            in_flight: BTreeSet::new(),
            failures: Vec::new(),
            cancelled: false,
        })
    }

    /// Returns true if a slot is free and an undispatched item remains.
    pub fn has_free_slot(&self) -> bool {
        !self.cancelled && self.active_count < self.concurrency && self.next_index < self.total_runs
    }

    /// Claims a slot for the next item and returns its index, or `None` when
    /// no slot is free or nothing is left to dispatch.
    pub fn dispatch_next(&mut self) -> Result<Option<usize>, RunnerError> {
        if !self.has_free_slot() {
            return Ok(None);
        }

        let index = self.next_index;
        if !self.in_flight.insert(index) {
            return Err(RunnerError::invariant(format!(
                "index {} dispatched twice",
                index
            )));
        }
        self.next_index += 1;
        self.active_count += 1;

        if self.active_count > self.concurrency {
            return Err(RunnerError::invariant(format!(
                "{} items active with concurrency {}",
                self.active_count, self.concurrency
            )));
        }
        self.peak_active = self.peak_active.max(self.active_count);

        Ok(Some(index))
    }

    /// Claims every free slot at once, returning the dispatched indices in
    /// ascending order.
    pub fn fill_slots(&mut self) -> Result<Vec<usize>, RunnerError> {
        let mut dispatched = Vec::new();
        while let Some(index) = self.dispatch_next()? {
            dispatched.push(index);
        }
        Ok(dispatched)
    }

    /// Frees the slot held by `index` and records its outcome.
    pub fn record_completion(
        &mut self,
        index: usize,
        outcome: Result<(), ItemError>,
    ) -> Result<(), RunnerError> {
        if !self.in_flight.remove(&index) {
            return Err(RunnerError::invariant(format!(
                "completion reported for index {} which is not in flight",
                index
            )));
        }
        self.active_count -= 1;
        self.completed_count += 1;

        if let Err(error) = outcome {
            self.failures.push(ItemFailure::new(index, error));
        }
        Ok(())
    }

    /// Stops further dispatch. Items already in flight still complete.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Returns true once nothing is active and nothing more will be dispatched.
    pub fn is_terminal(&self) -> bool {
        self.active_count == 0 && (self.cancelled || self.next_index == self.total_runs)
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns the next undispatched index.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Returns the number of items currently in flight.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Returns the number of finished items.
    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    /// Returns the failures recorded so far.
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// Consumes a terminal state and produces the run result.
    pub fn into_result(self) -> Result<RunResult, RunnerError> {
        if !self.is_terminal() {
            return Err(RunnerError::invariant(format!(
                "run finished with {} active and {} of {} dispatched",
                self.active_count, self.next_index, self.total_runs
            )));
        }

        let skipped = self.total_runs - self.next_index;
        let reason = if skipped > 0 {
            CompletionReason::Cancelled
        } else {
            CompletionReason::AllCompleted
        };

        Ok(RunResult {
            total_runs: self.total_runs,
            completed_count: self.completed_count,
            failures: self.failures,
            skipped,
            peak_active: self.peak_active,
            reason,
        })
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Completing in-flight items in an arbitrary order never breaks the
        /// slot bound, dispatches every index once in ascending order, and
        /// ends with every item completed.
        #[test]
        fn prop_slot_refill_invariants(
            total_runs in 0usize..=60,
            concurrency in 1usize..=12,
            picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..=60),
            failing in proptest::collection::btree_set(0usize..60, 0..10),
        ) {
            let mut state = RunState::new(&RunConfig::new(total_runs, concurrency)).unwrap();
            let mut dispatched = Vec::new();
            let mut in_flight: Vec<usize> = Vec::new();
            let mut picks = picks.into_iter();

            loop {
                for index in state.fill_slots().unwrap() {
                    dispatched.push(index);
                    in_flight.push(index);
                }
                prop_assert!(state.active_count() <= concurrency);
                prop_assert_eq!(state.active_count(), in_flight.len());

                if state.is_terminal() {
                    break;
                }

                let position = picks
                    .next()
                    .map(|pick| pick.index(in_flight.len()))
                    .unwrap_or(0);
                let index = in_flight.swap_remove(position);
                let outcome = if failing.contains(&index) {
                    Err(ItemError::msg("planned failure"))
                } else {
                    Ok(())
                };
                state.record_completion(index, outcome).unwrap();
            }

            prop_assert_eq!(dispatched, (0..total_runs).collect::<Vec<_>>());

            let result = state.into_result().unwrap();
            prop_assert_eq!(result.completed_count, total_runs);
            prop_assert!(result.peak_active <= concurrency.min(total_runs.max(1)));
            let expected_failures = failing.iter().filter(|&&i| i < total_runs).count();
            prop_assert_eq!(result.failure_count(), expected_failures);
        }

        /// Cancelling at any point accounts for every item exactly once.
        #[test]
        fn prop_cancel_accounts_for_every_item(
            total_runs in 1usize..=40,
            concurrency in 1usize..=8,
            completions_before_cancel in 0usize..=40,
        ) {
            let mut state = RunState::new(&RunConfig::new(total_runs, concurrency)).unwrap();
            let mut in_flight: Vec<usize> = state.fill_slots().unwrap();

            for _ in 0..completions_before_cancel {
                if in_flight.is_empty() {
                    break;
                }
                let index = in_flight.remove(0);
                state.record_completion(index, Ok(())).unwrap();
                in_flight.extend(state.fill_slots().unwrap());
            }

            state.cancel();
            for index in in_flight.drain(..) {
                state.record_completion(index, Ok(())).unwrap();
            }

            let result = state.into_result().unwrap();
            prop_assert_eq!(result.completed_count + result.skipped, total_runs);
        }
    }
}
