use std::collections::HashSet;

use sgp_schemas::{ItemContext, ScoreRow, UpdateCommand};

use crate::Validation;

/// Per-run row transformer. Remembers which users already produced a command.
#[derive(Debug, Default)]
pub struct Transformer {
    seen: HashSet<String>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` = skip: blank points, a rejected row, or a user that already
    /// has a command in this run. Blank rows do not claim the user.
    pub fn transform(
        &mut self,
        row: &ScoreRow,
        validation: &Validation,
        item: &ItemContext,
    ) -> Option<UpdateCommand> {
        let Validation::Update(points) = validation else {
            return None;
        };
        let user_id = row.user_id.trim();
        if !self.seen.insert(user_id.to_string()) {
            return None;
        }
        Some(UpdateCommand {
            item_id: item.item_id.clone(),
            user_id: user_id.to_string(),
            new_points: *points,
            max_points: item.max_points,
        })
    }

    pub fn emitted(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user: &str) -> ScoreRow {
        ScoreRow {
            user_id: user.to_string(),
            item_id: "X".to_string(),
            ..ScoreRow::default()
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let item = ItemContext::new("X", "C", 10.0);
        let mut t = Transformer::new();

        let first = t.transform(&row("7"), &Validation::Update(8.0), &item).unwrap();
        assert_eq!(first.new_points, 8.0);
        assert_eq!(first.max_points, 10.0);
        assert!(t.transform(&row("7"), &Validation::Update(3.0), &item).is_none());
        assert!(t.transform(&row("8"), &Validation::Update(3.0), &item).is_some());
        assert_eq!(t.emitted(), 2);
    }

    #[test]
    fn blank_row_does_not_claim_user() {
        let item = ItemContext::new("X", "C", 10.0);
        let mut t = Transformer::new();

        assert!(t.transform(&row("7"), &Validation::NoChange, &item).is_none());
        assert!(t.transform(&row("7"), &Validation::Update(4.0), &item).is_some());
    }

    #[test]
    fn rejected_row_is_skipped() {
        let item = ItemContext::new("X", "C", 10.0);
        let mut t = Transformer::new();
        let rejected = Validation::Rejected("no".to_string());
        assert!(t.transform(&row("7"), &rejected, &item).is_none());
        assert_eq!(t.emitted(), 0);
    }
}
