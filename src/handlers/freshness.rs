// src/handlers/freshness.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::scoreboard::{FreshnessParams, FreshnessResponse},
    scoring::Aggregator,
    store::AttemptStore,
};

/// Polling endpoint: reports whether the quiz has new step data.
///
/// Only the watermark is queried; the matrix is left alone. Once the client
/// has polled `max_polls` times without a change the response turns `stale`.
pub async fn get_freshness(
    State(store): State<Arc<dyn AttemptStore>>,
    State(config): State<Config>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<FreshnessParams>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = params.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = store
        .quiz_context(quiz_id)
        .await?
        .ok_or(AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

    let token = Aggregator::new(store.as_ref()).watermark(quiz.context_id).await?;

    let changed = params.since.is_none_or(|since| since != token.0);
    let stale = !changed && params.polls.unwrap_or(0) >= config.scoreboard.max_polls();

    Ok(Json(FreshnessResponse {
        token,
        changed,
        stale,
    }))
}
