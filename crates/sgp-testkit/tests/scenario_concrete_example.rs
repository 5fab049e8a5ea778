//! Scenario: Item worth 10 points, learner 7
//!
//! # Invariant under test
//! "8" stores grade 0.8 of max 10; "12" for the same item is refused with the
//! exact user-facing message and leaves the stored record alone.

use sgp_schemas::{Batch, RunOptions};
use sgp_store::ScoreStore;
use sgp_testkit::{item, signed_row, Harness, ITEM};

#[tokio::test]
async fn eight_of_ten_then_twelve_is_refused() {
    let h = Harness::new(0);
    let engine = h.reconciler();

    // ---------------------------------------------------------------------
    // 1) 8 points
    // ---------------------------------------------------------------------
    let first = Batch {
        item: item(10.0),
        rows: vec![signed_row("7", "5", "8")],
        options: RunOptions::default(),
    };
    let status = engine.run(&first, None).await.unwrap();
    assert!(status.is_clean());
    assert_eq!(status.succeeded, 1);

    let rec = h.store.get(ITEM, "7").await.unwrap().unwrap();
    assert!((rec.grade - 0.8).abs() < 1e-9, "grade={}", rec.grade);
    assert_eq!(rec.max_grade, 10.0);

    // ---------------------------------------------------------------------
    // 2) 12 points
    // ---------------------------------------------------------------------
    let second = Batch {
        item: item(10.0),
        rows: vec![signed_row("7", "5", "12")],
        options: RunOptions::default(),
    };
    let status = engine.run(&second, None).await.unwrap();
    assert_eq!(status.failed, 1);
    assert_eq!(
        status.error_messages(),
        vec!["Points must not be greater than 10.".to_string()]
    );

    let after = h.store.get(ITEM, "7").await.unwrap().unwrap();
    assert_eq!(after, rec);
    assert_eq!(h.store.write_count(), 1);
}
