//! Scenario: Course ended past the grace period with freezing enabled
//!
//! # Invariants under test
//! - Any submission, even a fully valid row, fails the whole run with
//!   `GradesFrozen` and no partial status.
//! - Nothing is written, inline or deferred.
//! - The same course without the freeze flag accepts updates.

use std::time::Duration;

use sgp_dispatch::{DispatchError, Submission};
use sgp_reconcile::RunError;
use sgp_schemas::{Batch, RunOptions};
use sgp_testkit::{frozen_schedule, item, signed_row, signed_rows, Harness, COURSE};

#[tokio::test]
async fn frozen_course_refuses_inline_run() {
    let h = Harness::with_schedule(0, Some(frozen_schedule()));
    let batch = Batch {
        item: item(10.0),
        rows: vec![signed_row("7", "5", "8")],
        options: RunOptions::default(),
    };

    let err = h.reconciler().run(&batch, None).await.unwrap_err();
    assert_eq!(
        err,
        RunError::GradesFrozen {
            course_id: COURSE.to_string()
        }
    );
    assert_eq!(h.store.write_count(), 0);

    let err = h.dispatcher(100).submit(batch).await.unwrap_err();
    assert!(matches!(err, DispatchError::Run(RunError::GradesFrozen { .. })));
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn frozen_course_surfaces_on_poll_when_deferred() {
    let h = Harness::with_schedule(0, Some(frozen_schedule()));
    let d = h.dispatcher(0);

    let job = match d
        .submit(Batch {
            item: item(10.0),
            rows: signed_rows(3, "4"),
            options: RunOptions::default(),
        })
        .await
        .unwrap()
    {
        Submission::Deferred { job } => job,
        other => panic!("threshold 0 defers everything: {other:?}"),
    };

    let err = d
        .wait(job.job_id, Duration::from_millis(5))
        .await
        .unwrap_err();
    assert!(
        matches!(err, DispatchError::Run(RunError::GradesFrozen { .. })),
        "{err:?}"
    );
    assert_eq!(h.store.write_count(), 0);
    assert!(h.storage.keys().await.is_empty());
}

#[tokio::test]
async fn ended_course_without_flag_accepts_updates() {
    let mut schedule = frozen_schedule();
    schedule.freeze_after_end = false;
    let h = Harness::with_schedule(0, Some(schedule));

    let status = h
        .reconciler()
        .run(
            &Batch {
                item: item(10.0),
                rows: vec![signed_row("7", "5", "8")],
                options: RunOptions::default(),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(status.succeeded, 1);
    assert_eq!(h.store.write_count(), 1);
}
