//! Cooperative bounded runner on the tokio runtime.
//!
//! The scheduler owns a [`RunState`] and a [`JoinSet`]. It fills every free
//! slot, suspends on the next completion, records it, and refills, until
//! the run is terminal. Work items never touch the state: their outcome is
//! delivered to the scheduler through the join set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinError, JoinSet};
use tracing::Instrument;

use crate::cancel::CancelHandle;
use crate::config::RunSpec;
use crate::error::{ItemError, RunnerError};
use crate::state::{RunResult, RunState};
use crate::work::Work;

/// Runs async work items with at most `concurrency` in flight.
///
/// Item failures (including panics) never abort a run: every item gets its
/// chance to run, and failures are returned in [`RunResult::failures`].
///
/// # Example
///
/// ```
/// use bounded_runner::{BoundedRunner, ItemError, RunSpec};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let spec = RunSpec::new(20, 5, |index: usize| async move {
///     if index == 7 {
///         return Err(ItemError::msg("seven"));
///     }
///     Ok(())
/// });
///
/// let result = BoundedRunner::new().run(spec).await.unwrap();
/// assert_eq!(result.completed_count, 20);
/// assert_eq!(result.failures.len(), 1);
/// assert_eq!(result.failures[0].index, 7);
/// # });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedRunner {
    _private: (),
}

impl BoundedRunner {
    /// Creates a new BoundedRunner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every item of `spec` and waits for the run to finish.
    ///
    /// Returns a configuration error, before anything is dispatched, when
    /// `concurrency` is zero.
    pub async fn run<W: Work>(&self, spec: RunSpec<W>) -> Result<RunResult, RunnerError> {
        self.run_with_cancel(spec, &CancelHandle::new()).await
    }

    /// Like [`run`](Self::run), but stops dispatching once `cancel` fires.
    ///
    /// In-flight items still run to completion; undispatched items are
    /// reported in [`RunResult::skipped`].
    pub async fn run_with_cancel<W: Work>(
        &self,
        spec: RunSpec<W>,
        cancel: &CancelHandle,
    ) -> Result<RunResult, RunnerError> {
        let RunSpec { config, work } = spec;
        let state = RunState::new(&config)?;

        let span = tracing::info_span!(
            "bounded_run",
            total_runs = config.total_runs,
            concurrency = config.concurrency,
        );

        if config.total_runs == 0 {
            span.in_scope(|| tracing::debug!("No items to run"));
            return Ok(RunResult::empty());
        }

        drive(state, Arc::new(work), cancel).instrument(span).await
    }
}

/// Runs `work` for every index in `0..total_runs` with the default runner.
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let result = bounded_runner::run_concurrently(3, 5, |_index: usize| async { Ok(()) })
///     .await
///     .unwrap();
/// assert!(result.all_succeeded());
/// # });
/// ```
pub async fn run_concurrently<W: Work>(
    total_runs: usize,
    concurrency: usize,
    work: W,
) -> Result<RunResult, RunnerError> {
    BoundedRunner::new()
        .run(RunSpec::new(total_runs, concurrency, work))
        .await
}

async fn drive<W: Work>(
    mut state: RunState,
    work: Arc<W>,
    cancel: &CancelHandle,
) -> Result<RunResult, RunnerError> {
    let mut tasks: JoinSet<Result<(), ItemError>> = JoinSet::new();
    let mut task_indices: HashMap<Id, usize> = HashMap::new();

    tracing::info!("Starting run");

    loop {
        if cancel.is_cancelled() && !state.is_cancelled() {
            state.cancel();
            tracing::info!(
                in_flight = state.active_count(),
                dispatched = state.next_index(),
                "Run cancelled, waiting for in-flight items"
            );
        }

        for index in state.fill_slots()? {
            let work = Arc::clone(&work);
            let handle = tasks.spawn(async move { work.run(index).await });
            task_indices.insert(handle.id(), index);
            tracing::debug!(index, active = state.active_count(), "Dispatched item");
        }

        if state.is_terminal() {
            break;
        }

        let joined = tokio::select! {
            joined = tasks.join_next_with_id() => Some(joined),
            _ = cancel.cancelled(), if !state.is_cancelled() => None,
        };
        let Some(joined) = joined else {
            continue;
        };
        let joined = joined.ok_or_else(|| {
            RunnerError::invariant(format!(
                "no tasks left to join with {} items active",
                state.active_count()
            ))
        })?;

        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(join_error) => (join_error.id(), Err(join_failure(join_error))),
        };
        let index = task_indices.remove(&id).ok_or_else(|| {
            RunnerError::invariant(format!("completed task {} has no item index", id))
        })?;

        match &outcome {
            Ok(()) => tracing::debug!(index, "Item completed"),
            Err(error) => tracing::warn!(index, error = %error, "Item failed"),
        }
        state.record_completion(index, outcome)?;
    }

    let result = state.into_result()?;
    tracing::info!(
        completed = result.completed_count,
        failed = result.failure_count(),
        skipped = result.skipped,
        peak_active = result.peak_active,
        reason = %result.reason,
        "Run finished"
    );
    Ok(result)
}

fn join_failure(join_error: JoinError) -> ItemError {
    if join_error.is_panic() {
        ItemError::from_panic(join_error.into_panic().as_ref())
    } else {
        ItemError::new("Aborted", "work item task was aborted")
    }
}
