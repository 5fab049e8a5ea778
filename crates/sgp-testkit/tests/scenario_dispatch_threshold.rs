//! Scenario: 99 rows run inline, 101 rows are deferred
//!
//! # Invariants under test
//! - Below the threshold the caller gets a completed status synchronously.
//! - At or above it the caller gets a job handle; polling yields the same
//!   status shape once the worker finishes.
//! - Unknown job ids are reported as not found.

use std::time::Duration;

use sgp_dispatch::{DispatchError, JobId, PollOutcome, Submission, DEFAULT_DEFER_THRESHOLD};
use sgp_schemas::{Batch, BatchStatus, RunOptions, RunState};
use sgp_testkit::{item, signed_rows, Harness};

fn batch(n: usize) -> Batch {
    Batch {
        item: item(10.0),
        rows: signed_rows(n, "6"),
        options: RunOptions::default(),
    }
}

fn shape(s: &BatchStatus) -> (RunState, usize, usize, usize, usize, usize, bool) {
    (s.state, s.total, s.processed, s.succeeded, s.skipped, s.failed, s.committed)
}

#[tokio::test]
async fn ninety_nine_inline_one_hundred_one_deferred() {
    // ---------------------------------------------------------------------
    // 1) 99 rows: completed synchronously
    // ---------------------------------------------------------------------
    let inline_h = Harness::new(0);
    let d = inline_h.dispatcher(DEFAULT_DEFER_THRESHOLD);
    let inline = match d.submit(batch(99)).await.unwrap() {
        Submission::Completed { status } => status,
        other => panic!("99 rows should run inline: {other:?}"),
    };
    assert_eq!(
        shape(&inline),
        (RunState::Complete, 99, 99, 99, 0, 0, true)
    );
    assert_eq!(inline_h.store.write_count(), 99);
    assert!(inline_h.storage.keys().await.is_empty());

    // ---------------------------------------------------------------------
    // 2) 101 rows: job handle, staged batch
    // ---------------------------------------------------------------------
    let deferred_h = Harness::new(0);
    let d = deferred_h.dispatcher(DEFAULT_DEFER_THRESHOLD);
    let job = match d.submit(batch(101)).await.unwrap() {
        Submission::Deferred { job } => job,
        other => panic!("101 rows should be deferred: {other:?}"),
    };

    // An immediate poll may already be done; either answer is legal.
    match d.poll(job.job_id).await.unwrap() {
        PollOutcome::Waiting { job_id, .. } => assert_eq!(job_id, job.job_id),
        PollOutcome::Done { .. } => {}
    }

    // ---------------------------------------------------------------------
    // 3) Worker result has the synchronous shape
    // ---------------------------------------------------------------------
    let deferred = d.wait(job.job_id, Duration::from_millis(5)).await.unwrap();
    assert_eq!(
        shape(&deferred),
        (RunState::Complete, 101, 101, 101, 0, 0, true)
    );
    assert_eq!(deferred.errors, inline.errors);
    assert_eq!(deferred.undo, inline.undo);
    assert_eq!(deferred_h.store.write_count(), 101);
    assert!(
        deferred_h.storage.keys().await.is_empty(),
        "staged batch must be removed after the run"
    );

    match d.poll(job.job_id).await.unwrap() {
        PollOutcome::Done { status } => assert_eq!(status, deferred),
        other => panic!("finished job should stay done: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let h = Harness::new(0);
    let d = h.dispatcher(DEFAULT_DEFER_THRESHOLD);
    match d.poll(JobId::new()).await {
        Err(DispatchError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}
