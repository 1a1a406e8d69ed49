//! Tests for the structured events emitted by runs.

use std::time::Duration;

use bounded_runner::{BoundedRunner, CancelHandle, RunSpec, WorkerPool};
use bounded_runner_testing::{ConcurrencyProbe, LogCapture, ScriptedWork};
use tracing::Level;

#[tokio::test(start_paused = true)]
async fn test_runner_logs_failures_and_summary() {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let work = ScriptedWork::new(ConcurrencyProbe::new())
        .with_fixed_delay(Duration::from_millis(10))
        .failing_at([7]);
    BoundedRunner::new()
        .run(RunSpec::new(20, 5, work))
        .await
        .unwrap();

    let failed = capture.with_message("Item failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, Level::WARN);
    assert_eq!(failed[0].field("index"), Some("7"));
    assert!(failed[0].field("error").unwrap().contains("item 7 failed"));

    let finished = capture.with_message("Run finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].level, Level::INFO);
    assert_eq!(finished[0].field("completed"), Some("20"));
    assert_eq!(finished[0].field("failed"), Some("1"));
    assert_eq!(finished[0].field("skipped"), Some("0"));
    assert_eq!(finished[0].field("reason"), Some("AllCompleted"));

    assert_eq!(capture.with_message("Dispatched item").len(), 20);
    assert_eq!(capture.with_message("Item completed").len(), 19);
}

#[tokio::test(start_paused = true)]
async fn test_runner_logs_cancellation() {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let cancel = CancelHandle::new();
    cancel.cancel();
    let result = BoundedRunner::new()
        .run_with_cancel(
            RunSpec::new(4, 2, ScriptedWork::new(ConcurrencyProbe::new())),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(result.skipped, 4);
    assert_eq!(
        capture
            .with_message("Run cancelled, waiting for in-flight items")
            .len(),
        1
    );
    let finished = capture.with_message("Run finished");
    assert_eq!(finished[0].field("reason"), Some("Cancelled"));
    assert_eq!(finished[0].field("skipped"), Some("4"));
}

#[test]
fn test_pool_logs_from_the_calling_thread() {
    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let work = ScriptedWork::new(ConcurrencyProbe::new()).failing_at([2]);
    WorkerPool::new().run(RunSpec::new(6, 2, work)).unwrap();

    let starting = capture.with_message("Starting run");
    assert_eq!(starting[0].field("workers"), Some("2"));

    let failed = capture.with_message("Item failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].field("index"), Some("2"));

    let finished = capture.with_message("Run finished");
    assert_eq!(finished[0].field("completed"), Some("6"));
}
