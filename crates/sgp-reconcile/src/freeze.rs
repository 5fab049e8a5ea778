//! Grade-freeze policy: writes stop once a course has ended plus a grace period.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sgp_schemas::CourseSchedule;
use sgp_store::CourseCatalog;

pub const DEFAULT_GRACE_DAYS: i64 = 30;

/// Pure decision. Frozen iff the course opted in, has an end date, and
/// `end + grace_days` is strictly before `now`.
pub fn are_grades_frozen(schedule: &CourseSchedule, now: DateTime<Utc>, grace_days: i64) -> bool {
    if !schedule.freeze_after_end {
        return false;
    }
    match schedule.end {
        Some(end) => end + Duration::days(grace_days) < now,
        None => false,
    }
}

/// Consults a [`CourseCatalog`]. Unknown courses are never frozen.
#[derive(Clone)]
pub struct FreezeGate {
    catalog: Arc<dyn CourseCatalog>,
    grace_days: i64,
    clock: fn() -> DateTime<Utc>,
}

impl std::fmt::Debug for FreezeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeGate")
            .field("grace_days", &self.grace_days)
            .finish_non_exhaustive()
    }
}

impl FreezeGate {
    pub fn new(catalog: Arc<dyn CourseCatalog>, grace_days: i64) -> Self {
        Self {
            catalog,
            grace_days,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn is_frozen(&self, course_id: &str) -> Result<bool> {
        let Some(schedule) = self.catalog.course(course_id).await? else {
            return Ok(false);
        };
        Ok(are_grades_frozen(&schedule, (self.clock)(), self.grace_days))
    }
}
