//! Async task facility: submit a job, ask whether it is done, fetch its result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sgp_reconcile::{ProgressSink, RunError};
use sgp_schemas::BatchStatus;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Done,
}

pub type JobFuture = BoxFuture<'static, Result<BatchStatus, RunError>>;

/// A deferred run. Receives a reporter for in-flight status snapshots.
pub type JobFn = Box<dyn FnOnce(ProgressReporter) -> JobFuture + Send>;

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn submit(&self, job: JobFn) -> Result<JobId>;

    /// `None` for an unknown id.
    async fn status(&self, job_id: JobId) -> Option<JobState>;

    /// Final outcome; `None` while pending or for an unknown id.
    async fn result(&self, job_id: JobId) -> Option<Result<BatchStatus, RunError>>;

    /// Latest snapshot reported by the worker, if any.
    async fn progress(&self, job_id: JobId) -> Option<BatchStatus>;
}

/// Publishes the latest status snapshot of one job.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<Option<BatchStatus>>,
}

impl ProgressSink for ProgressReporter {
    fn report(&self, status: &BatchStatus) {
        self.tx.send_replace(Some(status.clone()));
    }
}

// ---------------------------------------------------------------------------
// Tokio-backed queue
// ---------------------------------------------------------------------------

struct JobSlot {
    progress: watch::Receiver<Option<BatchStatus>>,
    outcome: Option<Result<BatchStatus, RunError>>,
}

/// Runs every job on the tokio runtime. Finished outcomes are kept for the
/// life of the queue.
#[derive(Clone, Default)]
pub struct TokioJobQueue {
    jobs: Arc<RwLock<HashMap<JobId, JobSlot>>>,
}

impl TokioJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for TokioJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioJobQueue").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl JobQueue for TokioJobQueue {
    async fn submit(&self, job: JobFn) -> Result<JobId> {
        let job_id = JobId::new();
        let (tx, rx) = watch::channel(None);

        self.jobs.write().await.insert(
            job_id,
            JobSlot {
                progress: rx,
                outcome: None,
            },
        );

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            // Inner task so a panicking job surfaces as a JoinError.
            let worker = tokio::spawn(job(ProgressReporter { tx }));
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "job worker crashed");
                    Err(RunError::Collaborator(format!("job worker crashed: {e}")))
                }
            };
            info!(job_id = %job_id, ok = outcome.is_ok(), "job finished");
            if let Some(slot) = jobs.write().await.get_mut(&job_id) {
                slot.outcome = Some(outcome);
            }
        });

        Ok(job_id)
    }

    async fn status(&self, job_id: JobId) -> Option<JobState> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id).map(|slot| match slot.outcome {
            Some(_) => JobState::Done,
            None => JobState::Pending,
        })
    }

    async fn result(&self, job_id: JobId) -> Option<Result<BatchStatus, RunError>> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id).and_then(|slot| slot.outcome.clone())
    }

    async fn progress(&self, job_id: JobId) -> Option<BatchStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .and_then(|slot| slot.progress.borrow().clone())
    }
}
