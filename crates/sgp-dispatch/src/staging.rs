//! Serialized batches parked in file storage for a worker to pick up.

use anyhow::{Context, Result};
use sgp_schemas::Batch;
use sgp_store::{key_segment, FileStorage};
use uuid::Uuid;

/// `csv/state/{item_id}/{uuid}.json`, the item id reduced to one key level.
pub fn staging_key(item_id: &str) -> String {
    format!("csv/state/{}/{}.json", key_segment(item_id), Uuid::new_v4())
}

pub async fn stage_batch(storage: &dyn FileStorage, batch: &Batch) -> Result<String> {
    let key = staging_key(&batch.item.item_id);
    let bytes = serde_json::to_vec(batch).context("serialize staged batch failed")?;
    storage
        .put(&key, bytes)
        .await
        .with_context(|| format!("stage batch failed key={key}"))?;
    Ok(key)
}

pub async fn load_staged(storage: &dyn FileStorage, key: &str) -> Result<Batch> {
    let bytes = storage
        .get(key)
        .await
        .with_context(|| format!("load staged batch failed key={key}"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("decode staged batch failed key={key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgp_schemas::{ItemContext, RunOptions, ScoreRow};
    use sgp_store::MemoryFileStorage;

    #[test]
    fn key_layout() {
        let key = staging_key("block/v1:X");
        assert!(key.starts_with("csv/state/block_v1:X/"), "{key}");
        assert!(key.ends_with(".json"));
        assert_ne!(staging_key("X"), staging_key("X"));
        assert!(staging_key("..").starts_with("csv/state/__/"));
    }

    #[tokio::test]
    async fn staged_batch_loads_back() {
        let storage = MemoryFileStorage::new();
        let batch = Batch {
            item: ItemContext::new("X", "C", 10.0),
            rows: vec![ScoreRow {
                user_id: "7".to_string(),
                points: "8".to_string(),
                ..ScoreRow::default()
            }],
            options: RunOptions {
                grader: Some("staff1".to_string()),
                ..RunOptions::default()
            },
        };

        let key = stage_batch(&storage, &batch).await.unwrap();
        assert_eq!(load_staged(&storage, &key).await.unwrap(), batch);
        assert!(load_staged(&storage, "csv/state/X/missing.json").await.is_err());
    }
}
