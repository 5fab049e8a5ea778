//! sgp-tabular
//!
//! CSV read/write for score files.
//!
//! ## Column contract
//!
//! | Column             | Import   | Notes                                  |
//! |--------------------|----------|----------------------------------------|
//! | `user_id`          | required |                                        |
//! | `item_id`          | required | must match the batch's target item     |
//! | `last_points`      | required | guarded by `checksum`                  |
//! | `checksum`         | required | written by export                      |
//! | `points`           | required | blank = no change                      |
//! | everything else    | ignored  | informational, written by export       |
//!
//! Header names and fields are trimmed; a UTF-8 BOM is stripped; blank lines
//! are skipped. Structural problems are an [`InputFormatError`] and abort the
//! whole import before any row is looked at.

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sgp_schemas::{ScoreRow, COLUMNS, REQUIRED_COLUMNS};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Default upload ceiling (2 MiB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 2 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// The input cannot be read as a score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum InputFormatError {
    #[error("the file is empty")]
    Empty,

    #[error("the file must be under {limit} bytes (got {size})")]
    TooLarge { size: usize, limit: usize },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("malformed file at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Parse a score file. `max_size` of `None` disables the size check.
pub fn read_rows(data: &[u8], max_size: Option<usize>) -> Result<Vec<ScoreRow>, InputFormatError> {
    if let Some(limit) = max_size {
        if data.len() > limit {
            return Err(InputFormatError::TooLarge {
                size: data.len(),
                limit,
            });
        }
    }

    let data = strip_utf8_bom(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(InputFormatError::Empty);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = rdr.headers().map_err(|e| malformed(&e, 1))?.clone();
    check_required_columns(&headers)?;

    let mut out = Vec::new();
    for rec in rdr.deserialize::<ScoreRow>() {
        let row = rec.map_err(|e| malformed(&e, 0))?;
        out.push(row);
    }
    Ok(out)
}

fn check_required_columns(headers: &csv::StringRecord) -> Result<(), InputFormatError> {
    for req in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == req) {
            return Err(InputFormatError::MissingColumn(req.to_string()));
        }
    }
    Ok(())
}

fn malformed(err: &csv::Error, fallback_line: u64) -> InputFormatError {
    let line = err
        .position()
        .map(csv::Position::line)
        .unwrap_or(fallback_line);
    InputFormatError::Malformed {
        line,
        reason: err.to_string(),
    }
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write a header plus `rows` in [`COLUMNS`] order. The header is written even
/// when there are no rows.
pub fn write_rows<'a, W, I>(out: W, rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a ScoreRow>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(COLUMNS).context("write csv header failed")?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("write csv row failed for user {}", row.user_id))?;
    }
    wtr.flush().context("flush csv writer failed")?;
    Ok(())
}

/// Render rows to an in-memory CSV file.
pub fn rows_to_csv<'a, I>(rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a ScoreRow>,
{
    let mut buf = Vec::new();
    write_rows(&mut buf, rows)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
