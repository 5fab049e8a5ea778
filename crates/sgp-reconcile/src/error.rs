use serde::{Deserialize, Serialize};
use sgp_schemas::ItemContext;
use sgp_tabular::InputFormatError;

/// A run that produced no status.
///
/// Row-level problems never appear here; they are recorded in the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunError {
    #[error("{0}")]
    InputFormat(#[from] InputFormatError),

    /// The item's point ceiling is NaN, infinite or negative.
    #[error("item {item_id} has an unusable max points value: {max_points}")]
    InvalidMaxPoints { item_id: String, max_points: String },

    #[error("grades are frozen for course {course_id}")]
    GradesFrozen { course_id: String },

    /// A collaborator failed before any row was looked at (course lookup,
    /// staged batch load, worker crash).
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl RunError {
    /// Refuse an item whose ceiling would corrupt every grade written under it.
    pub fn check_item(item: &ItemContext) -> Result<(), RunError> {
        if item.has_valid_max_points() {
            return Ok(());
        }
        Err(RunError::InvalidMaxPoints {
            item_id: item.item_id.clone(),
            max_points: item.max_points.to_string(),
        })
    }

    pub fn collaborator(err: &anyhow::Error) -> Self {
        RunError::Collaborator(format!("{err:#}"))
    }
}
