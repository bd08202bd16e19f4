// src/models/question.rs

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::scoring::grader::Grader;

/// Represents the 'question' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: i64,
    pub qtype: String,
    pub name: String,
    pub default_mark: f64,
}

/// How a question can be marked, decided when it is loaded.
#[derive(Clone)]
pub enum QuestionKind {
    Gradable(Arc<dyn Grader>),
    /// Graded by an outside engine; the scoreboard never computes a fraction.
    UngradableExternal,
    /// Needs a teacher to mark it (essays and the like).
    UngradableManual,
}

impl fmt::Debug for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Gradable(grader) => f.debug_tuple("Gradable").field(grader).finish(),
            QuestionKind::UngradableExternal => f.write_str("UngradableExternal"),
            QuestionKind::UngradableManual => f.write_str("UngradableManual"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub qtype: String,
    pub name: String,
    pub default_mark: f64,
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(row: QuestionRow, kind: QuestionKind) -> Self {
        Self {
            id: row.id,
            qtype: row.qtype,
            name: row.name,
            default_mark: row.default_mark,
            kind,
        }
    }

    pub fn is_gradable(&self) -> bool {
        matches!(self.kind, QuestionKind::Gradable(_))
    }

    /// Cloze-style questions whose response must be regrouped by part.
    pub fn is_multipart(&self) -> bool {
        match &self.kind {
            QuestionKind::Gradable(grader) => grader.part_count().is_some(),
            _ => false,
        }
    }
}
