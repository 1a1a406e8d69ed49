//! # Bounded Runner
//!
//! Run a work function `total_runs` times with at most `concurrency` items
//! in flight, refilling each slot with the next pending item the moment it
//! frees up, and wait until every item has completed.
//!
//! ## Overview
//!
//! The scheduler is a single state machine, [`RunState`], driven by one of
//! two substrates that honour the same contract:
//!
//! - [`BoundedRunner`]: cooperative async runner on tokio. Items are spawned
//!   into a `JoinSet` and the scheduler suspends on the next completion.
//! - [`WorkerPool`]: native threads scoped to a single run. Workers receive
//!   item indices over a queue and report completions back over another;
//!   every worker is joined before the run returns.
//!
//! ### Guarantees
//!
//! - At most `concurrency` items are active at any instant.
//! - Every index in `0..total_runs` is dispatched exactly once, in
//!   ascending order. Completion order is unconstrained.
//! - All free slots are filled before the scheduler waits, so a run starts
//!   with a burst of `min(concurrency, total_runs)` items.
//! - A `concurrency` of zero is rejected before anything is dispatched.
//!
//! ### Failure policy
//!
//! A failing item never aborts the run. Every item gets its chance to run,
//! and failures (including panics) are collected in
//! [`RunResult::failures`] with the index that produced them. Only
//! configuration errors and broken scheduler invariants are returned as
//! [`RunnerError`].
//!
//! ### Cancellation
//!
//! Attach a [`CancelHandle`] with `run_with_cancel`. Cancelling stops
//! further dispatch; in-flight items run to completion and the
//! undispatched tail is reported in [`RunResult::skipped`].
//!
//! ### Liveness
//!
//! There is no built-in timeout. An item that never completes keeps the run
//! from finishing; wrap the call in `tokio::time::timeout` or use a watchdog
//! that fires a [`CancelHandle`] if that is a concern.
//!
//! ## Example
//!
//! ```rust
//! use bounded_runner::{BoundedRunner, ItemError, RunSpec};
//! use std::time::Duration;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let spec = RunSpec::new(20, 5, |index: usize| async move {
//!     tokio::time::sleep(Duration::from_millis(1)).await;
//!     if index == 7 {
//!         return Err(ItemError::msg("item 7 always fails"));
//!     }
//!     Ok(())
//! });
//!
//! let result = BoundedRunner::new().run(spec).await?;
//! assert_eq!(result.completed_count, 20);
//! assert_eq!(result.failures.len(), 1);
//! # Ok::<(), bounded_runner::RunnerError>(())
//! # }).unwrap();
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod pool;
pub mod runner;
pub mod state;
pub mod work;

pub use cancel::CancelHandle;
pub use config::{RunConfig, RunSpec};
pub use error::{ItemError, RunnerError};
pub use pool::WorkerPool;
pub use runner::{run_concurrently, BoundedRunner};
pub use state::{CompletionReason, ItemFailure, RunResult, RunState};
pub use work::{BlockingWork, Work};
