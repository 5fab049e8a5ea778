use anyhow::{bail, Result};
use sgp_config::SgpConfig;

use super::{checksum_guard, read_file};

/// Prints `rows=N bad=M` and `bad_rows=[..]` (1-based data rows).
pub fn run(cfg: &SgpConfig, file: &str) -> Result<()> {
    let data = read_file(file)?;
    let rows = sgp_tabular::read_rows(&data, Some(cfg.import.max_file_size))?;
    let guard = checksum_guard(cfg);

    let bad: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !guard.verify(row))
        .map(|(idx, _)| idx + 1)
        .collect();

    println!("rows={} bad={}", rows.len(), bad.len());
    println!("bad_rows={:?}", bad);

    if !bad.is_empty() {
        bail!("VERIFY_FAILED: {} row(s) changed since export", bad.len());
    }
    Ok(())
}
