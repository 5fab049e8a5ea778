use sgp_schemas::{format_points, ItemContext, ScoreRow};

pub const MSG_ITEM_MISMATCH: &str =
    "The data does not match this item. Check that you uploaded the right file.";
pub const MSG_NOT_NUMERIC: &str = "Points must be numeric.";
pub const MSG_NEGATIVE: &str = "Points must not be negative.";
pub const MSG_CHECKSUM: &str = "The row has changed since it was exported.";

pub fn msg_over_max(max_points: f64) -> String {
    format!("Points must not be greater than {}.", format_points(max_points))
}

/// Outcome of validating one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Valid, with the parsed new point value.
    Update(f64),
    /// Valid, blank `points`.
    NoChange,
    Rejected(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Validation::Rejected(_))
    }

    /// `(ok, error)` view.
    pub fn into_result(self) -> (bool, Option<String>) {
        match self {
            Validation::Rejected(msg) => (false, Some(msg)),
            _ => (true, None),
        }
    }
}

/// Rules, first failure wins:
/// 1. `item_id` matches the batch item
/// 2. blank points = no change
/// 3. points parse as a finite number
/// 4. 0 <= points <= max
pub fn validate_row(row: &ScoreRow, item: &ItemContext) -> Validation {
    if row.item_id.trim() != item.item_id {
        return Validation::Rejected(MSG_ITEM_MISMATCH.to_string());
    }

    let raw = row.points.trim();
    if raw.is_empty() {
        return Validation::NoChange;
    }

    let points = match raw.parse::<f64>() {
        Ok(p) if p.is_finite() => p,
        _ => return Validation::Rejected(MSG_NOT_NUMERIC.to_string()),
    };

    if points < 0.0 {
        return Validation::Rejected(MSG_NEGATIVE.to_string());
    }
    if points > item.max_points {
        return Validation::Rejected(msg_over_max(item.max_points));
    }

    Validation::Update(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ItemContext {
        ItemContext::new("X", "C", 10.0)
    }

    fn row(item_id: &str, points: &str) -> ScoreRow {
        ScoreRow {
            user_id: "7".to_string(),
            item_id: item_id.to_string(),
            points: points.to_string(),
            ..ScoreRow::default()
        }
    }

    #[test]
    fn item_mismatch_wins_over_everything() {
        assert_eq!(
            validate_row(&row("Y", "abc"), &item()),
            Validation::Rejected(MSG_ITEM_MISMATCH.to_string())
        );
    }

    #[test]
    fn blank_points_is_no_change() {
        assert_eq!(validate_row(&row("X", ""), &item()), Validation::NoChange);
        assert_eq!(validate_row(&row("X", "   "), &item()), Validation::NoChange);
    }

    #[test]
    fn non_numeric_is_rejected() {
        for bad in ["abc", "1,5", "NaN", "inf"] {
            assert_eq!(
                validate_row(&row("X", bad), &item()),
                Validation::Rejected(MSG_NOT_NUMERIC.to_string()),
                "{bad}"
            );
        }
    }

    #[test]
    fn bounds() {
        assert_eq!(validate_row(&row("X", "10"), &item()), Validation::Update(10.0));
        assert_eq!(validate_row(&row("X", "0"), &item()), Validation::Update(0.0));
        assert_eq!(
            validate_row(&row("X", "12"), &item()),
            Validation::Rejected("Points must not be greater than 10.".to_string())
        );
        assert_eq!(
            validate_row(&row("X", "-1"), &item()),
            Validation::Rejected(MSG_NEGATIVE.to_string())
        );
    }

    #[test]
    fn fractional_max_is_rendered_compactly() {
        let it = ItemContext::new("X", "C", 7.5);
        assert_eq!(
            validate_row(&row("X", "8"), &it).into_result(),
            (false, Some("Points must not be greater than 7.5.".to_string()))
        );
    }
}
