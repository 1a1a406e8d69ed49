//! Scoped native-thread worker pool.
//!
//! A [`WorkerPool`] owns no threads between runs. Each call to
//! [`run`](WorkerPool::run) starts `min(concurrency, total_runs)` workers
//! inside a [`std::thread::scope`], feeds them item indices over a job
//! queue, and collects outcomes over a completion queue. The calling thread
//! is the only one that touches the [`RunState`]. When the run is terminal
//! the job queue is closed, every worker drains out, and all of them are
//! joined before `run` returns.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::cancel::CancelHandle;
use crate::config::RunSpec;
use crate::error::{ItemError, RunnerError};
use crate::state::{RunResult, RunState};
use crate::work::BlockingWork;

const DEFAULT_THREAD_NAME: &str = "bounded-worker";

/// Outcome of one item, sent from a worker to the coordinator.
#[derive(Debug)]
struct Completion {
    index: usize,
    outcome: Result<(), ItemError>,
}

/// Runs blocking work items on a pool of threads scoped to each run.
///
/// # Example
///
/// ```
/// use bounded_runner::{ItemError, RunSpec, WorkerPool};
///
/// let spec = RunSpec::new(8, 3, |index: usize| -> Result<(), ItemError> {
///     std::thread::sleep(std::time::Duration::from_millis(5));
///     if index == 4 {
///         return Err("four".into());
///     }
///     Ok(())
/// });
///
/// let result = WorkerPool::new().run(spec).unwrap();
/// assert_eq!(result.completed_count, 8);
/// assert_eq!(result.failures[0].index, 4);
/// ```
#[derive(Debug, Clone)]
pub struct WorkerPool {
    thread_name: String,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl WorkerPool {
    /// Creates a new WorkerPool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name prefix of worker threads. Workers are named
    /// `<prefix>-<n>`.
    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Returns the worker thread name prefix.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Runs every item of `spec`, blocking until all workers are joined.
    pub fn run<W: BlockingWork>(&self, spec: RunSpec<W>) -> Result<RunResult, RunnerError> {
        self.run_with_cancel(spec, &CancelHandle::new())
    }

    /// Like [`run`](Self::run), but stops dispatching once `cancel` fires.
    ///
    /// Cancellation is observed each time an item completes, which is the
    /// only moment a slot could be refilled anyway.
    pub fn run_with_cancel<W: BlockingWork>(
        &self,
        spec: RunSpec<W>,
        cancel: &CancelHandle,
    ) -> Result<RunResult, RunnerError> {
        let RunSpec { config, work } = spec;
        let mut state = RunState::new(&config)?;

        let span = tracing::info_span!(
            "bounded_pool_run",
            total_runs = config.total_runs,
            concurrency = config.concurrency,
        );
        let _entered = span.enter();

        if config.total_runs == 0 {
            tracing::debug!("No items to run");
            return Ok(RunResult::empty());
        }

        let workers = config.effective_concurrency();
        tracing::info!(workers, "Starting run");

        let outcome = thread::scope(|scope| {
            // Both senders live inside this closure so they are dropped, and
            // every worker unblocks, before the scope joins its threads.
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<usize>();
            let (done_tx, done_rx) = crossbeam_channel::unbounded::<Completion>();

            for worker_id in 0..workers {
                let jobs = job_rx.clone();
                let completions = done_tx.clone();
                let work = &work;
                let parent = span.clone();
                thread::Builder::new()
                    .name(format!("{}-{}", self.thread_name(), worker_id))
                    .spawn_scoped(scope, move || {
                        let _entered = parent.enter();
                        worker_loop(worker_id, work, jobs, completions);
                    })
                    .map_err(|e| {
                        RunnerError::worker_pool(format!(
                            "failed to spawn worker {}: {}",
                            worker_id, e
                        ))
                    })?;
            }
            drop(done_tx);

            coordinate(&mut state, &job_tx, &done_rx, cancel)
        });

        let result = outcome.and_then(|()| state.into_result())?;
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
}

fn coordinate(
    state: &mut RunState,
    jobs: &Sender<usize>,
    completions: &Receiver<Completion>,
    cancel: &CancelHandle,
) -> Result<(), RunnerError> {
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
            jobs.send(index)
                .map_err(|_| RunnerError::worker_pool("all workers exited before the run finished"))?;
            tracing::debug!(index, active = state.active_count(), "Dispatched item");
        }

        if state.is_terminal() {
            return Ok(());
        }

        let Completion { index, outcome } = completions.recv().map_err(|_| {
            RunnerError::worker_pool(format!(
                "completion queue disconnected with {} items active",
                state.active_count()
            ))
        })?;

        match &outcome {
            Ok(()) => tracing::debug!(index, "Item completed"),
            Err(error) => tracing::warn!(index, error = %error, "Item failed"),
        }
        state.record_completion(index, outcome)?;
    }
}

fn worker_loop<W: BlockingWork>(
    worker_id: usize,
    work: &W,
    jobs: Receiver<usize>,
    completions: Sender<Completion>,
) {
    tracing::trace!(worker_id, "Worker started");
    for index in jobs.iter() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work.run(index))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(ItemError::from_panic(payload.as_ref())),
        };
        if completions.send(Completion { index, outcome }).is_err() {
            break;
        }
    }
    tracing::trace!(worker_id, "Worker stopped");
}
