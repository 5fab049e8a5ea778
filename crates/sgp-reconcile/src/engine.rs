use std::sync::Arc;

use serde_json::{json, Value};
use sgp_checksum::ChecksumGuard;
use sgp_schemas::{
    Batch, BatchStatus, CommitPolicy, ItemContext, RunOptions, RunState, UndoEntry, UpdateCommand,
};
use sgp_store::ScoreStore;
use tracing::{info, warn};

use crate::freeze::FreezeGate;
use crate::transform::Transformer;
use crate::validate::{validate_row, Validation, MSG_CHECKSUM};
use crate::RunError;

/// Rows between progress reports.
pub const PROGRESS_EVERY: usize = 10;

/// Receives status snapshots while a run is in flight.
pub trait ProgressSink: Send + Sync {
    fn report(&self, status: &BatchStatus);
}

/// Runs one batch: stage every row, then commit the staged commands.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ScoreStore>,
    guard: ChecksumGuard,
    freeze: Option<FreezeGate>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("guard", &self.guard)
            .field("freeze", &self.freeze)
            .finish_non_exhaustive()
    }
}

enum Staged {
    Command(UpdateCommand),
    Skip,
    Rejected(String),
}

impl Reconciler {
    pub fn new(store: Arc<dyn ScoreStore>, guard: ChecksumGuard) -> Self {
        Self {
            store,
            guard,
            freeze: None,
        }
    }

    pub fn with_freeze_gate(mut self, gate: FreezeGate) -> Self {
        self.freeze = Some(gate);
        self
    }

    pub fn guard(&self) -> &ChecksumGuard {
        &self.guard
    }

    /// Parse `data`, then [`run`](Self::run) it.
    pub async fn run_csv(
        &self,
        data: &[u8],
        max_size: Option<usize>,
        item: ItemContext,
        options: RunOptions,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<BatchStatus, RunError> {
        let rows = sgp_tabular::read_rows(data, max_size)?;
        let batch = Batch {
            item,
            rows,
            options,
        };
        self.run(&batch, progress).await
    }

    pub async fn run(
        &self,
        batch: &Batch,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<BatchStatus, RunError> {
        let item = &batch.item;
        let options = &batch.options;

        info!(
            item_id = %item.item_id,
            course_id = %item.course_id,
            rows = batch.rows.len(),
            commit = options.commit.as_str(),
            rollback = options.rollback,
            "reconcile run start"
        );

        if let Err(e) = RunError::check_item(item) {
            warn!(item_id = %item.item_id, max_points = item.max_points, "unusable max points; run refused");
            return Err(e);
        }

        if let Some(gate) = &self.freeze {
            let frozen = gate
                .is_frozen(&item.course_id)
                .await
                .map_err(|e| RunError::collaborator(&e))?;
            if frozen {
                warn!(item_id = %item.item_id, course_id = %item.course_id, "grades frozen; run refused");
                return Err(RunError::GradesFrozen {
                    course_id: item.course_id.clone(),
                });
            }
        }

        let mut status = BatchStatus::new(batch.rows.len(), options.rollback);
        status.state = RunState::Running;
        emit(progress, &status);

        // Stage.
        let mut transformer = Transformer::new();
        let mut staged: Vec<(usize, UpdateCommand)> = Vec::new();
        for (idx, row) in batch.rows.iter().enumerate() {
            let rownum = idx + 1;
            status.processed += 1;

            match self.stage_row(&mut transformer, row, item) {
                Staged::Command(cmd) => staged.push((rownum, cmd)),
                Staged::Skip => status.skipped += 1,
                Staged::Rejected(msg) => status.record_error(rownum, msg),
            }

            if status.processed % PROGRESS_EVERY == 0 {
                emit(progress, &status);
            }
        }
        status.staged = staged.len();
        emit(progress, &status);

        // Commit.
        let commit = match options.commit {
            CommitPolicy::PerRow => true,
            CommitPolicy::AllOrNothing => status.failed == 0,
            CommitPolicy::DryRun => false,
        };
        if commit {
            status.committed = true;
            let state = state_blob(options);
            for (n, (rownum, cmd)) in staged.iter().enumerate() {
                match self.apply(cmd, &state, options.rollback).await {
                    Ok(undo) => {
                        status.succeeded += 1;
                        if let (Some(entries), Some(entry)) = (status.undo.as_mut(), undo) {
                            entries.push(entry);
                        }
                    }
                    Err(e) => {
                        warn!(
                            item_id = %cmd.item_id,
                            user_id = %cmd.user_id,
                            row = rownum,
                            error = %format!("{e:#}"),
                            "score apply failed"
                        );
                        status.record_error(*rownum, format!("Could not save the score: {e:#}"));
                    }
                }
                if (n + 1) % PROGRESS_EVERY == 0 {
                    emit(progress, &status);
                }
            }
        } else if !staged.is_empty() {
            info!(
                item_id = %item.item_id,
                staged = staged.len(),
                failed = status.failed,
                commit = options.commit.as_str(),
                "commit skipped"
            );
        }

        status.errors.sort_by_key(|e| e.row);
        status.state = RunState::Complete;
        emit(progress, &status);

        info!(
            item_id = %item.item_id,
            total = status.total,
            saved = status.succeeded,
            skipped = status.skipped,
            failed = status.failed,
            committed = status.committed,
            "reconcile run complete"
        );
        Ok(status)
    }

    fn stage_row(
        &self,
        transformer: &mut Transformer,
        row: &sgp_schemas::ScoreRow,
        item: &ItemContext,
    ) -> Staged {
        if !self.guard.verify(row) {
            return Staged::Rejected(MSG_CHECKSUM.to_string());
        }
        let validation = validate_row(row, item);
        if let Validation::Rejected(msg) = validation {
            return Staged::Rejected(msg);
        }
        match transformer.transform(row, &validation, item) {
            Some(cmd) => Staged::Command(cmd),
            None => Staged::Skip,
        }
    }

    async fn apply(
        &self,
        cmd: &UpdateCommand,
        state: &Value,
        collect_undo: bool,
    ) -> anyhow::Result<Option<UndoEntry>> {
        let undo = if collect_undo {
            let prev = self.store.get(&cmd.item_id, &cmd.user_id).await?;
            Some(UndoEntry {
                item_id: cmd.item_id.clone(),
                user_id: cmd.user_id.clone(),
                previous_points: prev.as_ref().map(|r| r.points()),
                max_points: prev.as_ref().map_or(cmd.max_points, |r| r.max_grade),
            })
        } else {
            None
        };

        self.store
            .set(
                &cmd.item_id,
                &cmd.user_id,
                cmd.grade_fraction(),
                cmd.max_points,
                state.clone(),
            )
            .await?;
        Ok(undo)
    }
}

fn state_blob(options: &RunOptions) -> Value {
    match options.grader.as_deref() {
        Some(name) if !name.trim().is_empty() => json!({ "grader": name.trim() }),
        _ => json!({}),
    }
}

fn emit(progress: Option<&dyn ProgressSink>, status: &BatchStatus) {
    if let Some(sink) = progress {
        sink.report(status);
    }
}
