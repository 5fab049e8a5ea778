//! In-memory collaborators for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use chrono::Utc;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use sgp_schemas::{CourseSchedule, Enrollment, Record};
use tokio::sync::RwLock;

use crate::{CourseCatalog, EnrollmentSource, FileStorage, ScoreStore};

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: RwLock<BTreeMap<(String, String), Record>>,
    writes: AtomicUsize,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls served.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Record>> {
        let records = self.records.read().await;
        Ok(records
            .get(&(item_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn get_many(
        &self,
        item_id: &str,
        user_ids: Option<&[String]>,
    ) -> Result<HashMap<String, Record>> {
        let records = self.records.read().await;
        let out = records
            .iter()
            .filter(|((item, user), _)| {
                item == item_id && user_ids.map_or(true, |ids| ids.contains(user))
            })
            .map(|((_, user), rec)| (user.clone(), rec.clone()))
            .collect();
        Ok(out)
    }

    async fn set(
        &self,
        item_id: &str,
        user_id: &str,
        grade: f64,
        max_grade: f64,
        state: Value,
    ) -> Result<()> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        records
            .entry((item_id.to_string(), user_id.to_string()))
            .and_modify(|rec| {
                rec.grade = grade;
                rec.max_grade = max_grade;
                rec.state = state.clone();
                rec.modified_at = now;
            })
            .or_insert_with(|| Record {
                item_id: item_id.to_string(),
                user_id: user_id.to_string(),
                grade,
                max_grade,
                state: state.clone(),
                created_at: now,
                modified_at: now,
            });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roster + schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryEnrollments {
    by_course: HashMap<String, Vec<Enrollment>>,
}

impl MemoryEnrollments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster of `course_id`. Order is kept.
    pub fn with_course(mut self, course_id: impl Into<String>, roster: Vec<Enrollment>) -> Self {
        self.by_course.insert(course_id.into(), roster);
        self
    }
}

impl EnrollmentSource for MemoryEnrollments {
    fn enrollments<'a>(&'a self, course_id: &'a str) -> BoxStream<'a, Result<Enrollment>> {
        let roster = self.by_course.get(course_id).map(Vec::as_slice).unwrap_or(&[]);
        stream::iter(roster.iter().cloned().map(Ok)).boxed()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCourseCatalog {
    courses: HashMap<String, CourseSchedule>,
}

impl StaticCourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, schedule: CourseSchedule) -> Self {
        self.courses.insert(schedule.course_id.clone(), schedule);
        self
    }
}

#[async_trait::async_trait]
impl CourseCatalog for StaticCourseCatalog {
    async fn course(&self, course_id: &str) -> Result<Option<CourseSchedule>> {
        Ok(self.courses.get(course_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl FileStorage for MemoryFileStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("file not found: {key}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use serde_json::json;

    fn learner(id: &str) -> Enrollment {
        Enrollment {
            user_id: id.to_string(),
            username: format!("user{id}"),
            full_name: String::new(),
            email: String::new(),
            active: true,
            track: "audit".to_string(),
            external_uid: None,
        }
    }

    #[tokio::test]
    async fn set_creates_then_updates_in_place() {
        let store = MemoryScoreStore::new();
        store.set("X", "7", 0.5, 10.0, json!({})).await.unwrap();
        let first = store.get("X", "7").await.unwrap().unwrap();

        store
            .set("X", "7", 0.8, 10.0, json!({"grader": "staff"}))
            .await
            .unwrap();
        let second = store.get("X", "7").await.unwrap().unwrap();

        assert_eq!(second.grade, 0.8);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.modified_at >= first.modified_at);
        assert_eq!(second.grader(), Some("staff"));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn get_many_filters_by_item_and_users() {
        let store = MemoryScoreStore::new();
        store.set("X", "1", 0.1, 1.0, json!({})).await.unwrap();
        store.set("X", "2", 0.2, 1.0, json!({})).await.unwrap();
        store.set("Y", "1", 0.3, 1.0, json!({})).await.unwrap();

        let all = store.get_many("X", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only = store
            .get_many("X", Some(&["2".to_string(), "9".to_string()]))
            .await
            .unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only["2"].grade, 0.2);
    }

    #[tokio::test]
    async fn roster_keeps_order_and_unknown_course_is_empty() {
        let src = MemoryEnrollments::new().with_course("C", vec![learner("3"), learner("1")]);
        let ids: Vec<String> = src
            .enrollments("C")
            .map_ok(|e| e.user_id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids, vec!["3", "1"]);

        let none: Vec<Enrollment> = src.enrollments("missing").try_collect().await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn file_storage_get_missing_errors_and_delete_is_idempotent() {
        let fs = MemoryFileStorage::new();
        fs.put("a/b", b"hi".to_vec()).await.unwrap();
        assert_eq!(fs.get("a/b").await.unwrap(), b"hi");
        fs.delete("a/b").await.unwrap();
        fs.delete("a/b").await.unwrap();
        assert!(fs.get("a/b").await.is_err());
    }
}
