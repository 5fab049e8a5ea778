//! Command handler modules for the `sgp` binary.
//!
//! Shared argument groups and helpers live here.

pub mod export;
pub mod import;
pub mod verify;

use anyhow::{Context, Result};
use clap::Args;
use sgp_checksum::ChecksumGuard;
use sgp_config::{report_unused_keys, SgpConfig, UnusedKeyPolicy};
use sgp_schemas::{CommitPolicy, ItemContext};
use tracing::warn;

/// Target item of an import or export.
#[derive(Args, Debug, Clone)]
pub struct ItemArgs {
    /// Item id (must match the file's item_id column on import)
    #[arg(long)]
    pub item: String,

    /// Parent course id (roster + grade-freeze lookups)
    #[arg(long)]
    pub course: String,

    /// Configured point ceiling of the item
    #[arg(long = "max-points", value_parser = parse_max_points)]
    pub max_points: f64,

    #[arg(long, default_value = "")]
    pub title: String,
}

impl ItemArgs {
    pub fn context(&self) -> ItemContext {
        ItemContext::new(&self.item, &self.course, self.max_points).with_title(&self.title)
    }
}

/// Finite and not negative.
fn parse_max_points(raw: &str) -> Result<f64, String> {
    let v: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("'{raw}' must be a finite number >= 0"));
    }
    Ok(v)
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Recorded as the grader of every written score
    #[arg(long)]
    pub grader: Option<String>,

    /// Collect undo entries (overrides import.rollback when set)
    #[arg(long, default_value_t = false)]
    pub rollback: bool,

    /// per_row | all_or_nothing | dry_run (default: import.commit_policy)
    #[arg(long = "commit-policy")]
    pub commit_policy: Option<String>,
}

/// Layered config, or defaults when no paths are given. Unused keys are logged.
pub fn load_config(paths: &[String]) -> Result<SgpConfig> {
    if paths.is_empty() {
        return Ok(SgpConfig::default());
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = sgp_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(pointer = %ptr, "unused config key");
    }
    loaded.typed()
}

pub fn parse_commit_policy(raw: Option<&str>, fallback: CommitPolicy) -> Result<CommitPolicy> {
    match raw {
        None => Ok(fallback),
        Some(s) => CommitPolicy::parse(s).with_context(|| {
            format!("invalid --commit-policy '{s}'. expected one of: per_row | all_or_nothing | dry_run")
        }),
    }
}

pub fn checksum_guard(cfg: &SgpConfig) -> ChecksumGuard {
    ChecksumGuard::new(cfg.checksum.secret(), cfg.checksum.size)
}

pub fn read_file(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read score file failed: {path}"))
}
