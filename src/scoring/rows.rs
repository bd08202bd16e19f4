// src/scoring/rows.rs

use std::collections::HashMap;

use crate::{
    models::{
        quiz::Slot,
        scoreboard::{Cell, CellClass, ScoreboardRow, SortOrder},
    },
    scoring::{aggregate::MarkMatrix, mark::Mark},
};

/// Fraction boundaries between the cell classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassThresholds {
    /// Above this a cell is `correct`.
    pub correct_above: f64,
    /// Above this (and up to `correct_above`) a cell is `partial`; below it `wrong`.
    pub partial_above: f64,
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            correct_above: 0.8,
            partial_above: 0.2,
        }
    }
}

impl ClassThresholds {
    pub fn new(correct_above: f64, partial_above: f64) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&partial_above)
            || !(0.0..=1.0).contains(&correct_above)
            || partial_above > correct_above
        {
            return Err(format!(
                "invalid class thresholds: need 0 <= partial ({}) <= correct ({}) <= 1",
                partial_above, correct_above
            ));
        }
        Ok(Self {
            correct_above,
            partial_above,
        })
    }

    pub fn classify(&self, fraction: f64) -> CellClass {
        if fraction > self.correct_above {
            CellClass::Correct
        } else if fraction > self.partial_above {
            CellClass::Partial
        } else if fraction > 0.0 {
            CellClass::Wrong
        } else {
            CellClass::Zero
        }
    }
}

/// Highest score reachable on the quiz; the percent denominator.
pub fn total_possible(slots: &[Slot]) -> f64 {
    slots.iter().map(|s| s.max_mark).sum()
}

fn cell(slot: &Slot, mark: &Mark, thresholds: &ClassThresholds) -> Cell {
    Cell {
        slot: slot.slot,
        fraction: mark.fraction,
        max_mark: mark.max_mark,
        mark: mark.points(),
        class: thresholds.classify(mark.fraction),
        parts: mark.parts.clone(),
    }
}

/// One row per roster entry, cells in slot order.
pub fn build_rows(
    roster: &[i64],
    names: &HashMap<i64, String>,
    slots: &[Slot],
    matrix: &MarkMatrix,
    thresholds: &ClassThresholds,
) -> Vec<ScoreboardRow> {
    let possible = total_possible(slots);

    roster
        .iter()
        .map(|&user_id| {
            let cells: Vec<Option<Cell>> = slots
                .iter()
                .map(|slot| {
                    matrix
                        .get(user_id, slot.slot)
                        .map(|mark| cell(slot, mark, thresholds))
                })
                .collect();

            let total: f64 = cells.iter().flatten().map(|c| c.mark).sum();
            let percent = if possible > 0.0 {
                100.0 * total / possible
            } else {
                0.0
            };

            ScoreboardRow {
                user_id,
                name: names.get(&user_id).cloned().unwrap_or_default(),
                total,
                percent,
                cells,
            }
        })
        .collect()
}

/// Stable sort: names ascending (byte order, case-sensitive) or totals descending.
///
/// Equal keys keep their roster order.
pub fn sort_rows(rows: &mut [ScoreboardRow], order: SortOrder) {
    match order {
        SortOrder::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        SortOrder::Score => rows.sort_by(|a, b| b.total.total_cmp(&a.total)),
    }
}
