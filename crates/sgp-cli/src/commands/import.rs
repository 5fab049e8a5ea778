use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sgp_config::SgpConfig;
use sgp_dispatch::{Dispatcher, Submission, TokioJobQueue};
use sgp_reconcile::{FreezeGate, Reconciler};
use sgp_schemas::{BatchStatus, ItemContext, RunOptions};
use sgp_store::{LocalFileStorage, PgCourseCatalog, PgScoreStore};
use tracing::info;

use super::{checksum_guard, parse_commit_policy, read_file, RunArgs};

pub async fn run(cfg: &SgpConfig, item: ItemContext, args: RunArgs, file: &str) -> Result<()> {
    let data = read_file(file)?;
    let options = RunOptions {
        commit: parse_commit_policy(args.commit_policy.as_deref(), cfg.import.commit_policy)?,
        rollback: args.rollback || cfg.import.rollback,
        grader: args.grader,
    };

    let pool = sgp_store::pg::connect_from_env().await?;
    let engine = Reconciler::new(Arc::new(PgScoreStore::new(pool.clone())), checksum_guard(cfg))
        .with_freeze_gate(FreezeGate::new(
            Arc::new(PgCourseCatalog::new(pool)),
            cfg.freeze.grace_days,
        ));
    let dispatcher = Dispatcher::new(
        engine,
        Arc::new(TokioJobQueue::new()),
        Arc::new(LocalFileStorage::new(&cfg.storage.root)),
    )
    .with_defer_threshold(cfg.dispatch.defer_threshold)
    .with_max_file_size(cfg.import.max_file_size);

    let status = match dispatcher.submit_csv(&data, item, options).await? {
        Submission::Completed { status } => status,
        Submission::Deferred { job } => {
            info!(job_id = %job.job_id, "import deferred; polling");
            let interval = Duration::from_millis(cfg.dispatch.poll_interval_ms.max(1));
            dispatcher.wait(job.job_id, interval).await?
        }
    };

    print_status(&status)
}

fn print_status(status: &BatchStatus) -> Result<()> {
    let json = serde_json::to_string_pretty(status).context("status json encode failed")?;
    println!("{json}");
    info!(
        total = status.total,
        saved = status.succeeded,
        failed = status.failed,
        percentage = %status.percentage(),
        "import finished"
    );
    Ok(())
}
