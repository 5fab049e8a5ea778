use std::sync::Arc;

use anyhow::{Context, Result};
use sgp_config::SgpConfig;
use sgp_export::ExportGenerator;
use sgp_schemas::ItemContext;
use sgp_store::{FileStorage, LocalFileStorage, PgEnrollmentSource, PgScoreStore};
use tracing::info;

use super::checksum_guard;

pub async fn run(cfg: &SgpConfig, item: ItemContext, out: Option<&str>, stage: bool) -> Result<()> {
    let pool = sgp_store::pg::connect_from_env().await?;
    let generator = ExportGenerator::new(
        Arc::new(PgScoreStore::new(pool.clone())),
        Arc::new(PgEnrollmentSource::new(pool)),
        checksum_guard(cfg),
    );

    let bytes = generator.write_csv(&item).await?;

    if stage {
        let storage = LocalFileStorage::new(&cfg.storage.root);
        let key = sgp_export::export_key(&item.item_id);
        storage.put(&key, bytes.clone()).await?;
        info!(key = %key, root = %cfg.storage.root, "export staged");
    }

    match out {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("write export failed: {path}"))?;
            info!(path = %path, bytes = bytes.len(), "export written");
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(&bytes)
                .context("write export to stdout failed")?;
        }
    }
    Ok(())
}
