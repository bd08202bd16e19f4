// src/scoring/aggregate.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    config::ScoreboardConfig,
    error::ScoreboardError,
    models::{
        question::Question,
        quiz::{Attempt, QuestionAttempt, Slot, Step},
        scoreboard::{
            FreshnessToken, GroupFilter, RefreshInfo, ReportParams, ScoreboardReport, SlotHeader,
        },
    },
    scoring::{
        mark::{Mark, resolve},
        response::{Response, accumulate},
        rows::{build_rows, sort_rows, total_possible},
    },
    store::AttemptStore,
    utils::html::header_text,
};

/// Best mark per (user, slot). A missing entry means no mark could be determined.
#[derive(Debug, Clone, Default)]
pub struct MarkMatrix {
    marks: HashMap<(i64, i32), Mark>,
}

impl MarkMatrix {
    pub fn get(&self, user_id: i64, slot: i32) -> Option<&Mark> {
        self.marks.get(&(user_id, slot))
    }

    /// Stores `mark` unless a better one is already recorded for the cell.
    pub fn record(&mut self, user_id: i64, slot: i32, mark: Mark) {
        let current = self.marks.remove(&(user_id, slot));
        self.marks.insert((user_id, slot), Mark::best(current, mark));
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Builds scoreboards from an attempt store. One instance serves one request.
pub struct Aggregator<'a> {
    store: &'a dyn AttemptStore,
    questions: HashMap<i64, Option<Question>>,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a dyn AttemptStore) -> Self {
        Self {
            store,
            questions: HashMap::new(),
        }
    }

    /// Loads a question once per request. Only an unavailable store is fatal;
    /// a question that cannot be loaded is logged and treated as missing.
    async fn question(&mut self, question_id: i64) -> Result<Option<Question>, ScoreboardError> {
        if let Some(cached) = self.questions.get(&question_id) {
            return Ok(cached.clone());
        }
        let loaded = match self.store.get_question(question_id).await {
            Ok(question) => question,
            Err(e @ ScoreboardError::StoreUnavailable(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(question_id, error = %e, "Question cannot be loaded, skipping it");
                None
            }
        };
        self.questions.insert(question_id, loaded.clone());
        Ok(loaded)
    }

    /// Resolves the mark of every (user, slot) covered by `attempts`.
    pub async fn mark_matrix(
        &mut self,
        attempts: &[Attempt],
        slots: &[Slot],
    ) -> Result<MarkMatrix, ScoreboardError> {
        let slot_map: HashMap<i32, &Slot> = slots.iter().map(|s| (s.slot, s)).collect();
        let mut matrix = MarkMatrix::default();

        for attempt in attempts {
            let question_attempts = self.store.list_question_attempts(attempt.usage_id).await?;

            for qa in &question_attempts {
                let Some(slot) = slot_map.get(&qa.slot) else {
                    tracing::warn!(
                        attempt_id = attempt.id,
                        "{}",
                        ScoreboardError::MissingSlotMapping {
                            question_attempt_id: qa.id,
                            slot: qa.slot,
                        }
                    );
                    continue;
                };

                if let Some(mark) = self.resolve_question_attempt(qa, slot).await? {
                    matrix.record(attempt.user_id, slot.slot, mark);
                }
            }
        }

        tracing::debug!(attempts = attempts.len(), marks = matrix.len(), "Mark matrix built");
        Ok(matrix)
    }

    /// Stored fraction first, then the ungradable check, then grading every
    /// submitted response and keeping the best.
    async fn resolve_question_attempt(
        &mut self,
        qa: &QuestionAttempt,
        slot: &Slot,
    ) -> Result<Option<Mark>, ScoreboardError> {
        let mut steps = self.store.list_steps(qa.id).await?;
        steps.sort_by_key(|s| (s.sequence, s.timestamp));

        if let Some(fraction) = stored_fraction(&steps) {
            return Ok(Some(Mark::new(fraction, slot.max_mark)));
        }

        let Some(question) = self.question(qa.question_id).await? else {
            tracing::warn!(
                question_id = qa.question_id,
                question_attempt_id = qa.id,
                "Question attempt references a missing question"
            );
            return Ok(None);
        };

        if !question.is_gradable() {
            return Ok(None);
        }

        let mut fields = BTreeMap::new();
        let mut best: Option<Mark> = None;

        for step in steps.iter().filter(|s| s.state.carries_response()) {
            let data = self.store.list_step_data(step.id).await?;
            accumulate(&mut fields, &data);
            if fields.is_empty() {
                continue;
            }

            let response = if question.is_multipart() {
                match Response::reassemble(&fields) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(step_id = step.id, question_id = question.id, "Skipping step: {}", e);
                        continue;
                    }
                }
            } else {
                Response::Fields(fields.clone())
            };

            match resolve(&question, slot, &response) {
                Ok(Some(mark)) => best = Some(Mark::best(best, mark)),
                Ok(None) => {}
                Err(ScoreboardError::MalformedResponse(msg)) => {
                    tracing::warn!(step_id = step.id, question_id = question.id, "Skipping step: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(best)
    }

    /// Distinct users in order of first attempt, optionally limited to one group.
    pub async fn roster(
        &self,
        attempts: &[Attempt],
        group: GroupFilter,
    ) -> Result<Vec<i64>, ScoreboardError> {
        let mut seen = HashSet::new();
        let mut users: Vec<i64> = attempts
            .iter()
            .map(|a| a.user_id)
            .filter(|id| seen.insert(*id))
            .collect();

        if let GroupFilter::Group(group_id) = group {
            let members: HashSet<i64> = self.store.group_members(group_id).await?.into_iter().collect();
            users.retain(|id| members.contains(id));
        }

        Ok(users)
    }

    pub async fn watermark(&self, context_id: i64) -> Result<FreshnessToken, ScoreboardError> {
        let latest = self.store.max_step_timestamp(context_id).await?;
        Ok(FreshnessToken(latest.unwrap_or(0)))
    }

    /// Computes the whole report for one request.
    pub async fn report(
        &mut self,
        quiz_id: i64,
        params: &ReportParams,
        config: &ScoreboardConfig,
    ) -> Result<ScoreboardReport, ScoreboardError> {
        let quiz = self
            .store
            .quiz_context(quiz_id)
            .await?
            .ok_or(ScoreboardError::QuizNotFound(quiz_id))?;

        let slots = self.store.get_slots(quiz_id).await?;
        let attempts = self.store.list_attempts(quiz_id).await?;

        let mut headers = Vec::with_capacity(slots.len());
        for slot in &slots {
            let name = self
                .question(slot.question_id)
                .await?
                .map(|q| header_text(&q.name))
                .unwrap_or_default();
            headers.push(SlotHeader {
                slot: slot.slot,
                question_id: slot.question_id,
                name,
                max_mark: slot.max_mark,
            });
        }

        let matrix = self.mark_matrix(&attempts, &slots).await?;
        let roster = self.roster(&attempts, params.group).await?;

        let mut names = HashMap::with_capacity(roster.len());
        for &user_id in &roster {
            let name = self
                .store
                .display_name(user_id)
                .await?
                .unwrap_or_else(|| format!("User {}", user_id));
            names.insert(user_id, name);
        }

        let mut rows = build_rows(&roster, &names, &slots, &matrix, &config.thresholds);
        sort_rows(&mut rows, params.order);

        let groups = if quiz.group_mode {
            self.store.list_groups(quiz_id).await?
        } else {
            Vec::new()
        };

        let token = self.watermark(quiz.context_id).await?;

        tracing::info!(
            quiz_id,
            students = rows.len(),
            slots = slots.len(),
            token = token.0,
            "Scoreboard computed"
        );

        Ok(ScoreboardReport {
            quiz_id,
            quiz_name: quiz.name,
            order: params.order,
            group: params.group,
            total_possible: total_possible(&slots),
            headers,
            rows,
            groups,
            refresh: RefreshInfo {
                token,
                interval_secs: config.refresh_interval_secs,
                max_polls: config.max_polls(),
            },
            generated_at: chrono::Utc::now(),
        })
    }
}

/// Highest fraction the host already stored on a completed step.
fn stored_fraction(steps: &[Step]) -> Option<f64> {
    steps
        .iter()
        .filter(|s| s.state.is_completed())
        .filter_map(|s| s.fraction)
        .reduce(f64::max)
}
