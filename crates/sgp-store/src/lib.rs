//! sgp-store
//!
//! Collaborators consumed by the reconciliation core, behind async traits:
//!
//! - [`ScoreStore`]: durable per-(item, user) score records.
//! - [`EnrollmentSource`]: course roster, streamed in enrollment order.
//! - [`CourseCatalog`]: course schedule consulted by the grade-freeze policy.
//! - [`FileStorage`]: byte blobs for staged batches and exports.
//!
//! Implementations: in-memory ([`memory`]), Postgres ([`pg`]) and local disk
//! ([`local`]). Each call is atomic for its own key; nothing spans calls.

use std::collections::HashMap;

use anyhow::Result;
use futures_util::stream::BoxStream;
use serde_json::Value;
use sgp_schemas::{CourseSchedule, Enrollment, Record};

pub mod local;
pub mod memory;
pub mod pg;

pub use local::LocalFileStorage;
pub use memory::{MemoryEnrollments, MemoryFileStorage, MemoryScoreStore, StaticCourseCatalog};
pub use pg::{PgCourseCatalog, PgEnrollmentSource, PgScoreStore, ENV_DB_URL};

/// One storage key component for an arbitrary id. Separators are flattened and
/// dot-only names replaced, so an id never adds or climbs key levels.
pub fn key_segment(id: &str) -> String {
    let flat = id.trim().replace(['/', '\\'], "_");
    if flat.chars().all(|c| c == '.') {
        "_".repeat(flat.len().max(1))
    } else {
        flat
    }
}

#[async_trait::async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Record>>;

    /// Records for `item_id`, keyed by user id. `None` means every user.
    async fn get_many(
        &self,
        item_id: &str,
        user_ids: Option<&[String]>,
    ) -> Result<HashMap<String, Record>>;

    /// Create or update the record. `created_at` is kept on update.
    async fn set(
        &self,
        item_id: &str,
        user_id: &str,
        grade: f64,
        max_grade: f64,
        state: Value,
    ) -> Result<()>;
}

pub trait EnrollmentSource: Send + Sync {
    /// Learners of `course_id` in enrollment order. Lazy; errors surface per item.
    fn enrollments<'a>(&'a self, course_id: &'a str) -> BoxStream<'a, Result<Enrollment>>;
}

#[async_trait::async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn course(&self, course_id: &str) -> Result<Option<CourseSchedule>>;
}

#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Errors when the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
