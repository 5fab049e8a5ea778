//! sgp-testkit
//!
//! In-memory fixtures for cross-crate scenarios: a roster, a score store, a
//! course schedule, blob storage, and helpers to build and edit score files.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use sgp_checksum::ChecksumGuard;
use sgp_dispatch::{Dispatcher, TokioJobQueue};
use sgp_export::ExportGenerator;
use sgp_reconcile::{FreezeGate, Reconciler, DEFAULT_GRACE_DAYS};
use sgp_schemas::{CourseSchedule, Enrollment, ItemContext, ScoreRow};
use sgp_store::{MemoryEnrollments, MemoryFileStorage, MemoryScoreStore, StaticCourseCatalog};

pub const ITEM: &str = "X";
pub const COURSE: &str = "C";
pub const SECRET: &str = "testkit-secret";

pub fn item(max_points: f64) -> ItemContext {
    ItemContext::new(ITEM, COURSE, max_points).with_title("Problem X")
}

pub fn guard() -> ChecksumGuard {
    ChecksumGuard::new(SECRET, sgp_checksum::DEFAULT_CHECKSUM_SIZE)
}

pub fn learner(user_id: &str) -> Enrollment {
    Enrollment {
        user_id: user_id.to_string(),
        username: format!("learner{user_id}"),
        full_name: format!("Learner {user_id}"),
        email: format!("learner{user_id}@example.com"),
        active: true,
        track: "audit".to_string(),
        external_uid: None,
    }
}

/// Learners with ids `1..=n`.
pub fn roster(n: usize) -> Vec<Enrollment> {
    (1..=n).map(|i| learner(&i.to_string())).collect()
}

/// A row for [`ITEM`] carrying a valid checksum.
pub fn signed_row(user_id: &str, last_points: &str, points: &str) -> ScoreRow {
    let mut row = ScoreRow {
        user_id: user_id.to_string(),
        item_id: ITEM.to_string(),
        last_points: last_points.to_string(),
        points: points.to_string(),
        ..ScoreRow::default()
    };
    guard().stamp(&mut row);
    row
}

/// `n` signed rows for users `1..=n`, every row setting `points`.
pub fn signed_rows(n: usize, points: &str) -> Vec<ScoreRow> {
    (1..=n).map(|i| signed_row(&i.to_string(), "", points)).collect()
}

pub fn to_csv(rows: &[ScoreRow]) -> Result<Vec<u8>> {
    sgp_tabular::rows_to_csv(rows)
}

/// Set the `points` column of the listed users, leaving checksums untouched.
pub fn edit_points(csv: &[u8], edits: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut rows = sgp_tabular::read_rows(csv, None)?;
    for row in rows.iter_mut() {
        if let Some((_, points)) = edits.iter().find(|(user, _)| *user == row.user_id) {
            row.points = points.to_string();
        }
    }
    to_csv(&rows)
}

/// Course ended long enough ago that grades are frozen.
pub fn frozen_schedule() -> CourseSchedule {
    CourseSchedule {
        course_id: COURSE.to_string(),
        end: Some(Utc::now() - Duration::days(DEFAULT_GRACE_DAYS + 5)),
        freeze_after_end: true,
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Every collaborator in memory, wired the way the binary wires Postgres.
pub struct Harness {
    pub store: Arc<MemoryScoreStore>,
    pub enrollments: Arc<MemoryEnrollments>,
    pub catalog: Arc<StaticCourseCatalog>,
    pub storage: Arc<MemoryFileStorage>,
}

impl Harness {
    pub fn new(roster_size: usize) -> Self {
        Self::with_schedule(roster_size, None)
    }

    pub fn with_schedule(roster_size: usize, schedule: Option<CourseSchedule>) -> Self {
        let mut catalog = StaticCourseCatalog::new();
        if let Some(s) = schedule {
            catalog = catalog.with_course(s);
        }
        Self {
            store: Arc::new(MemoryScoreStore::new()),
            enrollments: Arc::new(MemoryEnrollments::new().with_course(COURSE, roster(roster_size))),
            catalog: Arc::new(catalog),
            storage: Arc::new(MemoryFileStorage::new()),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), guard())
            .with_freeze_gate(FreezeGate::new(self.catalog.clone(), DEFAULT_GRACE_DAYS))
    }

    pub fn dispatcher(&self, defer_threshold: usize) -> Dispatcher {
        Dispatcher::new(
            self.reconciler(),
            Arc::new(TokioJobQueue::new()),
            self.storage.clone(),
        )
        .with_defer_threshold(defer_threshold)
    }

    pub fn exporter(&self) -> ExportGenerator {
        ExportGenerator::new(self.store.clone(), self.enrollments.clone(), guard())
    }
}
