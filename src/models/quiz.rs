// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The quiz and the context that owns its question usages.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizContext {
    pub quiz_id: i64,
    pub context_id: i64,
    pub name: String,
    /// Whether the course module runs in a group mode (enables the group selector).
    pub group_mode: bool,
}

/// Represents one row of the 'quiz_slots' table joined with its question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub question_id: i64,
    pub slot: i32,
    pub max_mark: f64,
}

/// One student's run through the quiz. `usage_id` is the question usage
/// holding every question attempt of this run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub usage_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionAttempt {
    pub id: i64,
    pub slot: i32,
    pub question_id: i64,
}

/// State a question attempt step was left in, as recorded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepState {
    Todo,
    Complete,
    Invalid,
    Finished,
    GaveUp,
    GradedRight,
    GradedPartial,
    GradedWrong,
    ManuallyGradedRight,
    ManuallyGradedPartial,
    ManuallyGradedWrong,
    Other(String),
}

impl StepState {
    /// States whose data is a response worth grading.
    pub fn carries_response(&self) -> bool {
        matches!(self, StepState::Complete | StepState::Invalid)
    }

    pub fn is_completed(&self) -> bool {
        !matches!(self, StepState::Todo)
    }

    pub fn as_str(&self) -> &str {
        match self {
            StepState::Todo => "todo",
            StepState::Complete => "complete",
            StepState::Invalid => "invalid",
            StepState::Finished => "finished",
            StepState::GaveUp => "gaveup",
            StepState::GradedRight => "gradedright",
            StepState::GradedPartial => "gradedpartial",
            StepState::GradedWrong => "gradedwrong",
            StepState::ManuallyGradedRight => "mangrright",
            StepState::ManuallyGradedPartial => "mangrpartial",
            StepState::ManuallyGradedWrong => "mangrwrong",
            StepState::Other(s) => s,
        }
    }
}

impl From<String> for StepState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "todo" => StepState::Todo,
            "complete" => StepState::Complete,
            "invalid" => StepState::Invalid,
            "finished" => StepState::Finished,
            "gaveup" => StepState::GaveUp,
            "gradedright" => StepState::GradedRight,
            "gradedpartial" => StepState::GradedPartial,
            "gradedwrong" => StepState::GradedWrong,
            "mangrright" => StepState::ManuallyGradedRight,
            "mangrpartial" => StepState::ManuallyGradedPartial,
            "mangrwrong" => StepState::ManuallyGradedWrong,
            _ => StepState::Other(raw),
        }
    }
}

impl From<StepState> for String {
    fn from(state: StepState) -> Self {
        state.as_str().to_string()
    }
}

/// A recorded state transition of one question attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub sequence: i32,
    pub state: StepState,
    /// Fraction stored by the host when it graded this step itself.
    pub fraction: Option<f64>,
    pub timestamp: i64,
}

/// Raw row shape of 'question_attempt_steps'.
#[derive(Debug, FromRow)]
pub struct StepRow {
    pub id: i64,
    pub sequencenumber: i32,
    pub state: String,
    pub fraction: Option<f64>,
    pub timecreated: i64,
}

impl From<StepRow> for Step {
    fn from(row: StepRow) -> Self {
        Self {
            id: row.id,
            sequence: row.sequencenumber,
            state: StepState::from(row.state),
            fraction: row.fraction,
            timestamp: row.timecreated,
        }
    }
}

/// One named fragment of a submitted response.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct StepDatum {
    pub name: String,
    pub value: String,
}

impl StepDatum {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Host bookkeeping such as `-submit`, `_order` or `:sequencecheck`, not student input.
    pub fn is_control(&self) -> bool {
        self.name.starts_with(['-', ':', '_'])
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_states_parse_from_host_strings() {
        assert_eq!(StepState::from("complete".to_string()), StepState::Complete);
        assert_eq!(StepState::from("mangrpartial".to_string()), StepState::ManuallyGradedPartial);
        assert_eq!(
            StepState::from("needsgrading".to_string()),
            StepState::Other("needsgrading".to_string())
        );
    }

    #[test]
    fn manual_grading_states_keep_their_host_string() {
        for raw in ["mangrright", "mangrpartial", "mangrwrong"] {
            let state = StepState::from(raw.to_string());
            assert!(state.is_completed());
            assert_eq!(String::from(state.clone()), raw);
            assert_eq!(serde_json::to_value(&state).unwrap(), serde_json::json!(raw));
        }
    }

    #[test]
    fn only_complete_and_invalid_carry_responses() {
        assert!(StepState::Complete.carries_response());
        assert!(StepState::Invalid.carries_response());
        assert!(!StepState::GradedRight.carries_response());
        assert!(!StepState::Todo.is_completed());
        assert!(StepState::GradedWrong.is_completed());
    }

    #[test]
    fn control_data_is_recognised() {
        assert!(StepDatum::new("-submit", "1").is_control());
        assert!(StepDatum::new(":sequencecheck", "2").is_control());
        assert!(StepDatum::new("_order", "3,1,2").is_control());
        assert!(!StepDatum::new("sub1_answer", "x").is_control());
    }
}
