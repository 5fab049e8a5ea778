//! sgp-schemas
//!
//! Shared data model for bulk score reconciliation.
//!
//! - [`Record`] is the persisted grade for one `(item_id, user_id)` pair.
//! - [`ScoreRow`] is one line of the tabular file, raw strings only.
//! - [`UpdateCommand`] is a normalized write produced from a valid row.
//! - [`BatchStatus`] accumulates the outcome of one reconciliation run.
//!
//! Plain data only. No IO.

mod status;

pub use status::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Persisted grade for one learner on one item.
///
/// `grade` is the earned fraction (0..=1); `max_grade` is the absolute point
/// ceiling supplied by the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub item_id: String,
    pub user_id: String,
    pub grade: f64,
    pub max_grade: f64,
    /// Opaque metadata, e.g. `{"grader": "staff1"}`.
    pub state: Value,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Record {
    /// Earned points. A zero ceiling is treated as 1 so the fraction is returned as-is.
    pub fn points(&self) -> f64 {
        let ceiling = if self.max_grade > 0.0 {
            self.max_grade
        } else {
            1.0
        };
        self.grade * ceiling
    }

    /// Name of whoever last applied this score, if the state blob carries one.
    pub fn grader(&self) -> Option<&str> {
        self.state.get("grader").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// ScoreRow
// ---------------------------------------------------------------------------

/// One line of the score file.
///
/// Field names double as CSV column names. Informational columns default to
/// empty on import so files carrying only the required columns still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub student_uid: String,
    #[serde(default)]
    pub enrolled: String,
    #[serde(default)]
    pub track: String,
    pub item_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_last_graded: String,
    #[serde(default)]
    pub who_last_graded: String,
    pub checksum: String,
    pub last_points: String,
    pub points: String,
}

/// Column order used when writing a score file.
pub const COLUMNS: [&str; 14] = [
    "user_id",
    "username",
    "full_name",
    "email",
    "student_uid",
    "enrolled",
    "track",
    "item_id",
    "title",
    "date_last_graded",
    "who_last_graded",
    "checksum",
    "last_points",
    "points",
];

/// Columns an import cannot do without.
pub const REQUIRED_COLUMNS: [&str; 5] = ["user_id", "points", "checksum", "item_id", "last_points"];

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Normalized score write derived from one valid row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCommand {
    pub item_id: String,
    pub user_id: String,
    pub new_points: f64,
    pub max_points: f64,
}

impl UpdateCommand {
    /// Fraction written to the store. A zero ceiling yields 0.
    pub fn grade_fraction(&self) -> f64 {
        if self.max_points > 0.0 {
            self.new_points / self.max_points
        } else {
            0.0
        }
    }
}

/// Snapshot taken before a write so the write could be reverted later.
///
/// `previous_points` is `None` when no record existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub item_id: String,
    pub user_id: String,
    pub previous_points: Option<f64>,
    pub max_points: f64,
}

// ---------------------------------------------------------------------------
// Batch inputs
// ---------------------------------------------------------------------------

/// The item a batch targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    pub item_id: String,
    /// Parent course; drives enrollment lookups and the grade-freeze policy.
    pub course_id: String,
    /// Configured point ceiling of the item.
    pub max_points: f64,
    #[serde(default)]
    pub title: String,
}

impl ItemContext {
    pub fn new(item_id: impl Into<String>, course_id: impl Into<String>, max_points: f64) -> Self {
        Self {
            item_id: item_id.into(),
            course_id: course_id.into(),
            max_points,
            title: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// A usable ceiling is finite and not negative.
    pub fn has_valid_max_points(&self) -> bool {
        self.max_points.is_finite() && self.max_points >= 0.0
    }
}

/// When staged commands are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Apply every staged command; rejected rows never block the others.
    #[default]
    PerRow,
    /// Apply only when no row was rejected.
    AllOrNothing,
    /// Never apply; report what would have been saved.
    DryRun,
}

impl CommitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitPolicy::PerRow => "per_row",
            CommitPolicy::AllOrNothing => "all_or_nothing",
            CommitPolicy::DryRun => "dry_run",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_row" | "per-row" => Some(CommitPolicy::PerRow),
            "all_or_nothing" | "all-or-nothing" => Some(CommitPolicy::AllOrNothing),
            "dry_run" | "dry-run" => Some(CommitPolicy::DryRun),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub commit: CommitPolicy,
    /// Collect undo entries before each write.
    #[serde(default)]
    pub rollback: bool,
    /// Recorded in each written record's state blob.
    #[serde(default)]
    pub grader: Option<String>,
}

/// Everything one run needs; serialized when a run is deferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub item: ItemContext,
    pub rows: Vec<ScoreRow>,
    #[serde(default)]
    pub options: RunOptions,
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// One enrolled learner of a course, in enrollment-source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub active: bool,
    pub track: String,
    pub external_uid: Option<String>,
}

/// Course dates consulted by the grade-freeze policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSchedule {
    pub course_id: String,
    pub end: Option<DateTime<Utc>>,
    /// Per-course switch for freezing grades after the end date.
    pub freeze_after_end: bool,
}

// ---------------------------------------------------------------------------
// Points formatting
// ---------------------------------------------------------------------------

/// Render a point value for files and messages: at most 4 decimals, no
/// trailing zeros (`10`, `7.5`, `0.3333`).
pub fn format_points(points: f64) -> String {
    let rounded = (points * 10_000.0).round() / 10_000.0;
    let s = format!("{rounded:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
