use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use serde::{Deserialize, Serialize};
use sgp_reconcile::{ProgressSink, Reconciler, RunError};
use sgp_schemas::{Batch, BatchStatus, ItemContext, RunOptions};
use sgp_store::FileStorage;
use tracing::{debug, error, info, warn};

use crate::queue::{JobFuture, JobId, JobQueue, JobState, ProgressReporter};
use crate::staging::{load_staged, stage_batch};
use crate::DispatchError;

/// Batches with fewer rows than this run inline.
pub const DEFAULT_DEFER_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Inline,
    Deferred,
}

/// Reference to a deferred run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: JobId,
    /// Where the batch was staged for the worker.
    pub staged_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    Completed { status: BatchStatus },
    Deferred { job: JobHandle },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Not finished; poll again. `progress` is the latest snapshot, if any.
    Waiting {
        job_id: JobId,
        progress: Option<BatchStatus>,
    },
    Done { status: BatchStatus },
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait RunStrategy: Send + Sync {
    fn mode(&self) -> DispatchMode;

    async fn execute(&self, batch: Batch) -> Result<Submission, DispatchError>;
}

/// Runs the engine on the caller's task.
#[derive(Debug, Clone)]
pub struct RunInline {
    engine: Reconciler,
}

impl RunInline {
    pub fn new(engine: Reconciler) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl RunStrategy for RunInline {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Inline
    }

    async fn execute(&self, batch: Batch) -> Result<Submission, DispatchError> {
        let status = self.engine.run(&batch, None).await?;
        Ok(Submission::Completed { status })
    }
}

/// Stages the batch and queues a job that loads, runs and removes it.
#[derive(Clone)]
pub struct RunDeferred {
    engine: Reconciler,
    queue: Arc<dyn JobQueue>,
    storage: Arc<dyn FileStorage>,
}

impl RunDeferred {
    pub fn new(engine: Reconciler, queue: Arc<dyn JobQueue>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            engine,
            queue,
            storage,
        }
    }
}

#[async_trait::async_trait]
impl RunStrategy for RunDeferred {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Deferred
    }

    async fn execute(&self, batch: Batch) -> Result<Submission, DispatchError> {
        let key = stage_batch(self.storage.as_ref(), &batch)
            .await
            .map_err(|e| DispatchError::staging(&e))?;

        let engine = self.engine.clone();
        let storage = Arc::clone(&self.storage);
        let job_key = key.clone();
        let job = Box::new(move |progress: ProgressReporter| -> JobFuture {
            Box::pin(async move {
                // The staged file goes away however the run ends.
                let run = run_staged(&engine, storage.as_ref(), &job_key, &progress);
                let outcome = AssertUnwindSafe(run)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        let msg = panic_message(payload.as_ref());
                        error!(key = %job_key, panic = %msg, "deferred run panicked");
                        Err(RunError::Collaborator(format!("deferred run panicked: {msg}")))
                    });
                if let Err(e) = storage.delete(&job_key).await {
                    warn!(key = %job_key, error = %format!("{e:#}"), "staged batch cleanup failed");
                }
                outcome
            })
        });

        let job_id = match self.queue.submit(job).await {
            Ok(id) => id,
            Err(e) => {
                // Nothing will pick the staged file up.
                if let Err(cleanup) = self.storage.delete(&key).await {
                    warn!(key = %key, error = %format!("{cleanup:#}"), "staged batch cleanup failed");
                }
                return Err(DispatchError::staging(&e));
            }
        };

        info!(
            job_id = %job_id,
            item_id = %batch.item.item_id,
            rows = batch.rows.len(),
            key = %key,
            "run deferred"
        );
        Ok(Submission::Deferred {
            job: JobHandle {
                job_id,
                staged_key: key,
            },
        })
    }
}

async fn run_staged(
    engine: &Reconciler,
    storage: &dyn FileStorage,
    key: &str,
    progress: &ProgressReporter,
) -> Result<BatchStatus, RunError> {
    let batch = load_staged(storage, key)
        .await
        .map_err(|e| RunError::collaborator(&e))?;
    engine.run(&batch, Some(progress as &dyn ProgressSink)).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    inline: RunInline,
    deferred: RunDeferred,
    queue: Arc<dyn JobQueue>,
    defer_threshold: usize,
    max_file_size: Option<usize>,
}

impl Dispatcher {
    pub fn new(engine: Reconciler, queue: Arc<dyn JobQueue>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            inline: RunInline::new(engine.clone()),
            deferred: RunDeferred::new(engine, Arc::clone(&queue), storage),
            queue,
            defer_threshold: DEFAULT_DEFER_THRESHOLD,
            max_file_size: None,
        }
    }

    /// 0 defers every batch.
    pub fn with_defer_threshold(mut self, threshold: usize) -> Self {
        self.defer_threshold = threshold;
        self
    }

    pub fn with_max_file_size(mut self, limit: usize) -> Self {
        self.max_file_size = Some(limit);
        self
    }

    pub fn defer_threshold(&self) -> usize {
        self.defer_threshold
    }

    /// Strategy for a batch of `rows` rows.
    pub fn strategy_for(&self, rows: usize) -> &dyn RunStrategy {
        if rows < self.defer_threshold {
            &self.inline
        } else {
            &self.deferred
        }
    }

    /// An unusable item is refused before anything is staged.
    pub async fn submit(&self, batch: Batch) -> Result<Submission, DispatchError> {
        RunError::check_item(&batch.item)?;
        let strategy = self.strategy_for(batch.rows.len());
        debug!(
            item_id = %batch.item.item_id,
            rows = batch.rows.len(),
            threshold = self.defer_threshold,
            mode = ?strategy.mode(),
            "dispatch"
        );
        strategy.execute(batch).await
    }

    /// Parse first so format errors surface before any dispatch decision.
    pub async fn submit_csv(
        &self,
        data: &[u8],
        item: ItemContext,
        options: RunOptions,
    ) -> Result<Submission, DispatchError> {
        let rows = sgp_tabular::read_rows(data, self.max_file_size).map_err(RunError::from)?;
        self.submit(Batch {
            item,
            rows,
            options,
        })
        .await
    }

    /// Non-blocking.
    pub async fn poll(&self, job_id: JobId) -> Result<PollOutcome, DispatchError> {
        let not_found = || DispatchError::NotFound {
            job_id: job_id.to_string(),
        };

        match self.queue.status(job_id).await {
            None => Err(not_found()),
            Some(JobState::Pending) => {
                let progress = self.queue.progress(job_id).await;
                debug!(job_id = %job_id, processed = progress.as_ref().map(|p| p.processed), "poll: waiting");
                Ok(PollOutcome::Waiting { job_id, progress })
            }
            Some(JobState::Done) => match self.queue.result(job_id).await {
                Some(Ok(status)) => Ok(PollOutcome::Done { status }),
                Some(Err(e)) => Err(DispatchError::Run(e)),
                None => Err(not_found()),
            },
        }
    }

    /// Poll every `interval` until the job finishes.
    pub async fn wait(&self, job_id: JobId, interval: Duration) -> Result<BatchStatus, DispatchError> {
        loop {
            match self.poll(job_id).await? {
                PollOutcome::Done { status } => return Ok(status),
                PollOutcome::Waiting { .. } => tokio::time::sleep(interval).await,
            }
        }
    }
}
