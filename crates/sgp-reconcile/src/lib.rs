//! sgp-reconcile
//!
//! Validate-then-apply reconciliation of a score file against a [`ScoreStore`].
//!
//! - Checksum Guard rejects rows edited since export.
//! - Row Validator checks item match and point bounds ([`validate_row`]).
//! - Row Transformer turns valid rows into [`UpdateCommand`]s, first
//!   occurrence per user wins ([`Transformer`]).
//! - [`Reconciler`] stages every row, then commits the staged commands.
//!
//! Row failures are data in [`BatchStatus`]; only [`RunError`] aborts a run.
//!
//! [`ScoreStore`]: sgp_store::ScoreStore
//! [`UpdateCommand`]: sgp_schemas::UpdateCommand
//! [`BatchStatus`]: sgp_schemas::BatchStatus

mod engine;
mod error;
mod freeze;
mod transform;
mod validate;

pub use engine::{ProgressSink, Reconciler, PROGRESS_EVERY};
pub use error::RunError;
pub use freeze::{are_grades_frozen, FreezeGate, DEFAULT_GRACE_DAYS};
pub use transform::Transformer;
pub use validate::*;
