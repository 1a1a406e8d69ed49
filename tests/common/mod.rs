//! Shared test utilities for integration tests.
//!
//! This module provides runtime builders, assertions and proptest
//! strategies used across the scenario files.

#![allow(dead_code)] // These utilities are used by other integration test files

use bounded_runner::{CompletionReason, RunResult};
use proptest::prelude::*;

/// A current-thread runtime with a paused clock, for proptest cases that
/// cannot use `#[tokio::test(start_paused = true)]`.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build paused runtime")
}

/// Asserts that a finished, uncancelled run accounted for every item.
pub fn assert_every_item_completed(result: &RunResult, total_runs: usize) {
    assert_eq!(result.total_runs, total_runs);
    assert_eq!(result.completed_count, total_runs);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.reason, CompletionReason::AllCompleted);
}

/// Asserts that exactly the given indices failed, in any order.
pub fn assert_failed_indices(result: &RunResult, expected: &[usize]) {
    let mut failed: Vec<usize> = result.failures.iter().map(|f| f.index).collect();
    failed.sort_unstable();
    let mut expected = expected.to_vec();
    expected.sort_unstable();
    assert_eq!(failed, expected);
}

// =============================================================================
// Proptest Strategies
// =============================================================================

/// (total_runs, concurrency) pairs covering concurrency below, equal to and
/// above the item count.
pub fn run_shape_strategy() -> impl Strategy<Value = (usize, usize)> {
    (0usize..=40, 1usize..=12)
}

/// Per-index delays in milliseconds.
pub fn delays_strategy() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(0u64..=50, 40)
}

/// A small set of indices that should fail.
pub fn failing_strategy() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::btree_set(0usize..40, 0..6).prop_map(|set| set.into_iter().collect())
}
