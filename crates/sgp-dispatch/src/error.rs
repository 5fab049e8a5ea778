use serde::{Deserialize, Serialize};
use sgp_reconcile::RunError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    /// The run itself failed, inline or in the worker.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The batch could not be staged or queued.
    #[error("staging failed: {0}")]
    Staging(String),
}

impl DispatchError {
    pub fn staging(err: &anyhow::Error) -> Self {
        DispatchError::Staging(format!("{err:#}"))
    }
}
