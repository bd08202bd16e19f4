// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::ScoreboardError,
    models::{
        question::{Question, QuestionKind, QuestionRow},
        quiz::{Attempt, Group, QuestionAttempt, QuizContext, Slot, Step, StepDatum, StepRow},
    },
    scoring::grader::{AnswerKey, QuestionDefinition, question_kind},
    store::AttemptStore,
};

/// Context level of course modules in the host's `context` table.
const CONTEXT_MODULE: i32 = 70;

/// `AttemptStore` over the host's Postgres tables.
///
/// Table names carry the host's prefix, so queries are assembled at runtime
/// and bound parameters carry every value.
#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
    prefix: String,
    external_qtypes: Vec<String>,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool, prefix: impl Into<String>, external_qtypes: Vec<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            external_qtypes,
        }
    }

    async fn question_row(&self, question_id: i64) -> Result<Option<QuestionRow>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT id, qtype, name, defaultmark::FLOAT8 AS default_mark
            FROM {p}question
            WHERE id = $1
            "#,
            p = self.prefix
        );
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch question {}: {:?}", question_id, e);
                ScoreboardError::from(e)
            })?;
        Ok(row)
    }

    async fn answer_keys(&self, question_id: i64) -> Result<Vec<AnswerKey>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT
                a.answer,
                a.fraction::FLOAT8 AS fraction,
                CASE WHEN n.tolerance ~ '^-?[0-9.]+(e-?[0-9]+)?$'
                     THEN n.tolerance::FLOAT8 END AS tolerance
            FROM {p}question_answers a
            LEFT JOIN {p}question_numerical n ON n.answer = a.id
            WHERE a.question = $1
            ORDER BY a.id
            "#,
            p = self.prefix
        );
        let keys = sqlx::query_as::<_, AnswerKey>(&sql)
            .bind(question_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn sub_question_ids(&self, parent_id: i64) -> Result<Vec<i64>, ScoreboardError> {
        let sql = format!(
            "SELECT id FROM {p}question WHERE parent = $1 AND id <> $1 ORDER BY id",
            p = self.prefix
        );
        let ids = sqlx::query_scalar::<_, i64>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// `usecase` of a short answer question; questions without options ignore case.
    async fn case_sensitive(&self, question_id: i64) -> Result<bool, ScoreboardError> {
        let sql = format!(
            "SELECT usecase::INT4 FROM {p}qtype_shortanswer_options WHERE questionid = $1",
            p = self.prefix
        );
        let usecase = sqlx::query_scalar::<_, i32>(&sql)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(usecase.is_some_and(|u| u != 0))
    }

    /// Marking capability of a single, non-cloze question.
    async fn simple_kind(&self, row: &QuestionRow) -> Result<QuestionKind, ScoreboardError> {
        let definition = QuestionDefinition {
            answers: self.answer_keys(row.id).await?,
            case_sensitive: row.qtype == "shortanswer" && self.case_sensitive(row.id).await?,
            parts: Vec::new(),
        };
        Ok(question_kind(&row.qtype, definition, &self.external_qtypes))
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn quiz_context(&self, quiz_id: i64) -> Result<Option<QuizContext>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT
                q.id AS quiz_id,
                ctx.id AS context_id,
                q.name,
                (cm.groupmode > 0) AS group_mode
            FROM {p}quiz q
            JOIN {p}modules m ON m.name = 'quiz'
            JOIN {p}course_modules cm ON cm.module = m.id AND cm.instance = q.id
            JOIN {p}context ctx ON ctx.instanceid = cm.id AND ctx.contextlevel = $2
            WHERE q.id = $1
            "#,
            p = self.prefix
        );
        let quiz = sqlx::query_as::<_, QuizContext>(&sql)
            .bind(quiz_id)
            .bind(CONTEXT_MODULE)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch quiz {}: {:?}", quiz_id, e);
                ScoreboardError::from(e)
            })?;
        Ok(quiz)
    }

    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT id, userid AS user_id, uniqueid AS usage_id
            FROM {p}quiz_attempts
            WHERE quiz = $1
            ORDER BY id
            "#,
            p = self.prefix
        );
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list attempts of quiz {}: {:?}", quiz_id, e);
                ScoreboardError::from(e)
            })?;
        Ok(attempts)
    }

    async fn list_question_attempts(&self, usage_id: i64) -> Result<Vec<QuestionAttempt>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT id, slot::INT4 AS slot, questionid AS question_id
            FROM {p}question_attempts
            WHERE questionusageid = $1
            ORDER BY slot
            "#,
            p = self.prefix
        );
        let rows = sqlx::query_as::<_, QuestionAttempt>(&sql)
            .bind(usage_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_steps(&self, question_attempt_id: i64) -> Result<Vec<Step>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT id, sequencenumber::INT4 AS sequencenumber, state,
                   fraction::FLOAT8 AS fraction, timecreated
            FROM {p}question_attempt_steps
            WHERE questionattemptid = $1
            ORDER BY sequencenumber
            "#,
            p = self.prefix
        );
        let rows = sqlx::query_as::<_, StepRow>(&sql)
            .bind(question_attempt_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Step::from).collect())
    }

    async fn list_step_data(&self, step_id: i64) -> Result<Vec<StepDatum>, ScoreboardError> {
        let sql = format!(
            "SELECT name, value FROM {p}question_attempt_step_data WHERE attemptstepid = $1 ORDER BY id",
            p = self.prefix
        );
        let data = sqlx::query_as::<_, StepDatum>(&sql)
            .bind(step_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(data)
    }

    async fn get_question(&self, question_id: i64) -> Result<Option<Question>, ScoreboardError> {
        let Some(row) = self.question_row(question_id).await? else {
            return Ok(None);
        };

        let kind = if row.qtype == "multianswer" {
            let mut parts = Vec::new();
            for sub_id in self.sub_question_ids(row.id).await? {
                match self.question_row(sub_id).await? {
                    Some(sub) => parts.push((self.simple_kind(&sub).await?, sub.default_mark)),
                    None => parts.push((QuestionKind::UngradableExternal, 0.0)),
                }
            }
            let definition = QuestionDefinition {
                parts,
                ..QuestionDefinition::default()
            };
            question_kind(&row.qtype, definition, &self.external_qtypes)
        } else {
            self.simple_kind(&row).await?
        };

        tracing::debug!(question_id, qtype = %row.qtype, ?kind, "Question loaded");
        Ok(Some(Question::new(row, kind)))
    }

    async fn get_slots(&self, quiz_id: i64) -> Result<Vec<Slot>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT s.questionid AS question_id, s.slot::INT4 AS slot, s.maxmark::FLOAT8 AS max_mark
            FROM {p}quiz_slots s
            JOIN {p}question q ON q.id = s.questionid
            WHERE s.quizid = $1 AND q.qtype <> 'description'
            ORDER BY s.slot
            "#,
            p = self.prefix
        );
        let slots = sqlx::query_as::<_, Slot>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch slots of quiz {}: {:?}", quiz_id, e);
                ScoreboardError::from(e)
            })?;
        Ok(slots)
    }

    async fn list_groups(&self, quiz_id: i64) -> Result<Vec<Group>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT g.id, g.name
            FROM {p}groups g
            JOIN {p}quiz q ON q.course = g.courseid
            WHERE q.id = $1
            ORDER BY g.name, g.id
            "#,
            p = self.prefix
        );
        let groups = sqlx::query_as::<_, Group>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    async fn group_members(&self, group_id: i64) -> Result<Vec<i64>, ScoreboardError> {
        let sql = format!(
            "SELECT userid FROM {p}groups_members WHERE groupid = $1",
            p = self.prefix
        );
        let members = sqlx::query_scalar::<_, i64>(&sql)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    async fn display_name(&self, user_id: i64) -> Result<Option<String>, ScoreboardError> {
        let sql = format!(
            "SELECT firstname || ' ' || lastname FROM {p}user WHERE id = $1",
            p = self.prefix
        );
        let name = sqlx::query_scalar::<_, String>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn max_step_timestamp(&self, context_id: i64) -> Result<Option<i64>, ScoreboardError> {
        let sql = format!(
            r#"
            SELECT MAX(st.timecreated)
            FROM {p}question_attempt_steps st
            JOIN {p}question_attempts qa ON qa.id = st.questionattemptid
            JOIN {p}question_usages qu ON qu.id = qa.questionusageid
            WHERE qu.contextid = $1
            "#,
            p = self.prefix
        );
        let latest = sqlx::query_scalar::<_, Option<i64>>(&sql)
            .bind(context_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(latest)
    }
}
