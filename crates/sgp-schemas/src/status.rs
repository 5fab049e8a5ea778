use serde::{Deserialize, Serialize};

use crate::UndoEntry;

/// Lifecycle of one reconciliation run. There is no failed state: row
/// failures are data, run-level failures never produce a status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Complete,
}

/// A rejected row: 1-based data row index plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Running outcome of one batch.
///
/// When `committed` is true, `succeeded + skipped + failed == total` once the
/// run is complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub state: RunState,
    /// Data rows in the input.
    pub total: usize,
    /// Rows examined so far.
    pub processed: usize,
    /// Update commands produced by staging.
    pub staged: usize,
    /// Rows whose update was written.
    pub succeeded: usize,
    /// Valid rows that requested no change (blank points, repeated user).
    pub skipped: usize,
    pub failed: usize,
    /// Ordered by row index.
    pub errors: Vec<RowError>,
    /// Present only when the run collected undo entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo: Option<Vec<UndoEntry>>,
    /// Whether the commit phase ran.
    pub committed: bool,
}

impl BatchStatus {
    pub fn new(total: usize, collect_undo: bool) -> Self {
        Self {
            total,
            undo: collect_undo.then(Vec::new),
            ..Self::default()
        }
    }

    pub fn record_error(&mut self, row: usize, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(RowError {
            row,
            message: message.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Row indexes that failed, in order.
    pub fn error_rows(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.row).collect()
    }

    /// Distinct messages in first-seen order.
    pub fn error_messages(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.errors {
            if !out.contains(&e.message) {
                out.push(e.message.clone());
            }
        }
        out
    }

    /// Share of rows saved, e.g. `"80.0%"`.
    pub fn percentage(&self) -> String {
        let denom = self.total.max(1) as f64;
        format!("{:.1}%", self.succeeded as f64 * 100.0 / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_deduplicated_in_order() {
        let mut st = BatchStatus::new(4, false);
        st.record_error(1, "b");
        st.record_error(2, "a");
        st.record_error(4, "b");
        assert_eq!(st.error_messages(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(st.error_rows(), vec![1, 2, 4]);
        assert_eq!(st.failed, 3);
    }

    #[test]
    fn percentage_handles_empty_batch() {
        let st = BatchStatus::new(0, false);
        assert_eq!(st.percentage(), "0.0%");

        let mut st = BatchStatus::new(5, false);
        st.succeeded = 4;
        assert_eq!(st.percentage(), "80.0%");
    }

    #[test]
    fn undo_only_present_when_requested() {
        assert!(BatchStatus::new(1, false).undo.is_none());
        assert_eq!(BatchStatus::new(1, true).undo, Some(Vec::new()));
    }
}
