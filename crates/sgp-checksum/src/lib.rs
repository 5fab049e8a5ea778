//! sgp-checksum
//!
//! Staleness guard for exported score rows.
//!
//! An export stamps every row with a digest over `user_id`, `item_id` and
//! `last_points`; an import recomputes it and rejects rows whose guarded
//! fields were edited in between. This is change detection, not
//! authentication: the digest is truncated and the optional secret only keeps
//! digests from being trivially reproduced by hand.

use sha2::{Digest, Sha256};
use sgp_schemas::ScoreRow;

/// Fields covered by the digest, in canonical order.
pub const CHECKSUM_FIELDS: [&str; 3] = ["user_id", "item_id", "last_points"];

/// Hex digits kept by default (64 bits).
pub const DEFAULT_CHECKSUM_SIZE: usize = 16;

const MIN_CHECKSUM_SIZE: usize = 8;
const MAX_CHECKSUM_SIZE: usize = 64;

/// Separator placed between fields so `("1", "23")` and `("12", "3")` differ.
const FIELD_SEPARATOR: char = '\u{1f}';

/// The guarded field subset of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumFields<'a> {
    pub user_id: &'a str,
    pub item_id: &'a str,
    pub last_points: &'a str,
}

impl<'a> From<&'a ScoreRow> for ChecksumFields<'a> {
    fn from(row: &'a ScoreRow) -> Self {
        Self {
            user_id: &row.user_id,
            item_id: &row.item_id,
            last_points: &row.last_points,
        }
    }
}

/// Computes and verifies row digests.
///
/// Export and import must use guards built with the same secret and size.
#[derive(Clone)]
pub struct ChecksumGuard {
    secret: String,
    size: usize,
}

impl std::fmt::Debug for ChecksumGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumGuard")
            .field("secret", &"REDACTED")
            .field("size", &self.size)
            .finish()
    }
}

impl Default for ChecksumGuard {
    fn default() -> Self {
        Self::new("", DEFAULT_CHECKSUM_SIZE)
    }
}

impl ChecksumGuard {
    /// `size` is clamped to 8..=64 hex digits.
    pub fn new(secret: impl Into<String>, size: usize) -> Self {
        Self {
            secret: secret.into(),
            size: size.clamp(MIN_CHECKSUM_SIZE, MAX_CHECKSUM_SIZE),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Digest of the guarded fields. Fields are trimmed before hashing.
    pub fn compute(&self, fields: ChecksumFields<'_>) -> String {
        let mut canonical = String::new();
        for part in [fields.user_id, fields.item_id, fields.last_points] {
            canonical.push_str(part.trim());
            canonical.push(FIELD_SEPARATOR);
        }
        canonical.push_str(&self.secret);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(self.size);
        digest
    }

    pub fn compute_row(&self, row: &ScoreRow) -> String {
        self.compute(ChecksumFields::from(row))
    }

    /// Overwrite the row's checksum column with a fresh digest.
    pub fn stamp(&self, row: &mut ScoreRow) {
        row.checksum = self.compute_row(row);
    }

    /// `true` when the row's checksum matches its guarded fields. Never errors;
    /// a blank checksum simply fails.
    pub fn verify(&self, row: &ScoreRow) -> bool {
        let claimed = row.checksum.trim();
        !claimed.is_empty() && claimed.eq_ignore_ascii_case(&self.compute_row(row))
    }
}
