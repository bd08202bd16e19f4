// src/scoring/mark.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    error::ScoreboardError,
    models::{
        question::{Question, QuestionKind},
        quiz::Slot,
    },
    scoring::response::Response,
};

/// A determined mark for one (student, slot) cell.
///
/// `fraction` may be exactly 0.0: an attempted-but-wrong answer is still a mark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mark {
    pub fraction: f64,
    pub max_mark: f64,
    /// Per-part fractions of multi-part questions.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parts: BTreeMap<u32, f64>,
}

impl Mark {
    pub fn new(fraction: f64, max_mark: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            max_mark,
            parts: BTreeMap::new(),
        }
    }

    /// Marks earned: `fraction × max_mark`.
    pub fn points(&self) -> f64 {
        self.fraction * self.max_mark
    }

    /// Keeps whichever of the two marks has the higher fraction; ties keep `current`.
    pub fn best(current: Option<Mark>, candidate: Mark) -> Mark {
        match current {
            Some(current) if current.fraction >= candidate.fraction => current,
            _ => candidate,
        }
    }
}

/// Grades a response to the question in `slot`.
///
/// Returns `Ok(None)` for questions without automatic grading.
pub fn resolve(
    question: &Question,
    slot: &Slot,
    response: &Response,
) -> Result<Option<Mark>, ScoreboardError> {
    let grader = match &question.kind {
        QuestionKind::Gradable(grader) => grader,
        QuestionKind::UngradableExternal | QuestionKind::UngradableManual => {
            tracing::trace!("{}", ScoreboardError::UngradableQuestion(question.id));
            return Ok(None);
        }
    };

    let grade = grader.grade(response)?;

    let mut mark = Mark::new(grade.fraction, slot.max_mark);
    mark.parts = grade.parts;
    Ok(Some(mark))
}
