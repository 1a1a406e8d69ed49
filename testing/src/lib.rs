//! Testing utilities for bounded-runner.
//!
//! - **ConcurrencyProbe**: observe, from inside work items, how many items
//!   were active at once and the order they started in
//! - **ScriptedWork**: work with per-index delays, failures and panics that
//!   runs on both the async runner and the worker pool
//! - **LogCapture**: a `tracing` layer that records events for assertions
//!
//! # Example
//!
//! ```ignore
//! use bounded_runner::{BoundedRunner, RunSpec};
//! use bounded_runner_testing::{ConcurrencyProbe, ScriptedWork};
//! use std::time::Duration;
//!
//! #[tokio::test(start_paused = true)]
//! async fn never_more_than_five() {
//!     let probe = ConcurrencyProbe::new();
//!     let work = ScriptedWork::new(probe.clone()).with_fixed_delay(Duration::from_secs(1));
//!
//!     let result = BoundedRunner::new().run(RunSpec::new(20, 5, work)).await.unwrap();
//!
//!     assert_eq!(result.completed_count, 20);
//!     assert_eq!(probe.peak(), 5);
//! }
//! ```

pub mod logs;
pub mod probe;
pub mod work;

pub use logs::{CapturedEvent, LogCapture};
pub use probe::{ConcurrencyProbe, ProbeGuard};
pub use work::{staggered_delay, ScriptedWork, SCRIPTED_FAILURE};
