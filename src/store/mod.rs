// src/store/mod.rs

pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::ScoreboardError,
    models::{
        question::Question,
        quiz::{Attempt, Group, QuestionAttempt, QuizContext, Slot, Step, StepDatum},
    },
};

pub use postgres::PgAttemptStore;

/// Read-only access to the host's quiz attempt tables.
///
/// Every query may fail with `ScoreboardError::StoreUnavailable`; callers
/// propagate it and never retry.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn quiz_context(&self, quiz_id: i64) -> Result<Option<QuizContext>, ScoreboardError>;

    /// Attempts of the quiz in creation order.
    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, ScoreboardError>;

    async fn list_question_attempts(&self, usage_id: i64) -> Result<Vec<QuestionAttempt>, ScoreboardError>;

    async fn list_steps(&self, question_attempt_id: i64) -> Result<Vec<Step>, ScoreboardError>;

    async fn list_step_data(&self, step_id: i64) -> Result<Vec<StepDatum>, ScoreboardError>;

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>, ScoreboardError>;

    /// Scored slots in slot order; description questions are left out.
    async fn get_slots(&self, quiz_id: i64) -> Result<Vec<Slot>, ScoreboardError>;

    async fn list_groups(&self, quiz_id: i64) -> Result<Vec<Group>, ScoreboardError>;

    async fn group_members(&self, group_id: i64) -> Result<Vec<i64>, ScoreboardError>;

    async fn display_name(&self, user_id: i64) -> Result<Option<String>, ScoreboardError>;

    /// Latest step timestamp across every question usage of the context.
    async fn max_step_timestamp(&self, context_id: i64) -> Result<Option<i64>, ScoreboardError>;
}
