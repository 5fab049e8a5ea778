//! sgp-export
//!
//! Full-roster score snapshot for one item.
//!
//! Every enrolled learner yields one row, scored or not, in enrollment order.
//! Rows carry a fresh checksum so the file can be edited and re-imported.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use sgp_checksum::ChecksumGuard;
use sgp_schemas::{format_points, Enrollment, ItemContext, Record, ScoreRow};
use sgp_store::{key_segment, EnrollmentSource, FileStorage, ScoreStore};
use tracing::info;

/// Storage key of an item's staged export, the item id reduced to one key level.
pub fn export_key(item_id: &str) -> String {
    format!("csv/export/{}.csv", key_segment(item_id))
}

#[derive(Clone)]
pub struct ExportGenerator {
    store: Arc<dyn ScoreStore>,
    enrollments: Arc<dyn EnrollmentSource>,
    guard: ChecksumGuard,
}

impl ExportGenerator {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        enrollments: Arc<dyn EnrollmentSource>,
        guard: ChecksumGuard,
    ) -> Self {
        Self {
            store,
            enrollments,
            guard,
        }
    }

    /// Lazy row sequence. Current records are loaded once up front; the roster
    /// is streamed.
    pub async fn export<'a>(
        &'a self,
        item: &'a ItemContext,
    ) -> Result<BoxStream<'a, Result<ScoreRow>>> {
        let records = self
            .store
            .get_many(&item.item_id, None)
            .await
            .with_context(|| format!("load scores for export item_id={}", item.item_id))?;

        let rows = self
            .enrollments
            .enrollments(&item.course_id)
            .map_ok(move |e| {
                let mut row = export_row(item, &e, records.get(&e.user_id));
                self.guard.stamp(&mut row);
                row
            })
            .boxed();
        Ok(rows)
    }

    /// Collected export as CSV bytes (header included even with no learners).
    pub async fn write_csv(&self, item: &ItemContext) -> Result<Vec<u8>> {
        let rows: Vec<ScoreRow> = self.export(item).await?.try_collect().await?;
        let bytes = sgp_tabular::rows_to_csv(&rows)?;
        info!(item_id = %item.item_id, rows = rows.len(), bytes = bytes.len(), "export rendered");
        Ok(bytes)
    }

    /// Render and stage the export; returns the storage key.
    pub async fn export_to_storage(
        &self,
        item: &ItemContext,
        storage: &dyn FileStorage,
    ) -> Result<String> {
        let bytes = self.write_csv(item).await?;
        let key = export_key(&item.item_id);
        storage.put(&key, bytes).await?;
        info!(item_id = %item.item_id, key = %key, "export staged");
        Ok(key)
    }
}

fn export_row(item: &ItemContext, e: &Enrollment, rec: Option<&Record>) -> ScoreRow {
    ScoreRow {
        user_id: e.user_id.clone(),
        username: e.username.clone(),
        full_name: e.full_name.clone(),
        email: e.email.clone(),
        student_uid: e.external_uid.clone().unwrap_or_default(),
        enrolled: e.active.to_string(),
        track: e.track.clone(),
        item_id: item.item_id.clone(),
        title: item.title.clone(),
        date_last_graded: rec
            .map(|r| r.modified_at.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default(),
        who_last_graded: rec
            .and_then(Record::grader)
            .map(str::to_string)
            .unwrap_or_default(),
        checksum: String::new(),
        last_points: rec.map(|r| format_points(r.points())).unwrap_or_default(),
        points: String::new(),
    }
}
