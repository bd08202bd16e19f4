// src/handlers/report.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    config::Config,
    error::AppError,
    models::scoreboard::ReportParams,
    scoring::Aggregator,
    store::AttemptStore,
};

/// Builds the live scoreboard of a quiz.
///
/// * Recomputes the whole mark matrix from the attempt store.
/// * Sorts by `order` (`name` or `score`) and narrows to `group` when given.
/// * Carries the freshness token the client polls against.
pub async fn get_scoreboard(
    State(store): State<Arc<dyn AttemptStore>>,
    State(config): State<Config>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = Aggregator::new(store.as_ref())
        .report(quiz_id, &params, &config.scoreboard)
        .await
        .map_err(|e| {
            tracing::error!("Failed to build scoreboard for quiz {}: {}", quiz_id, e);
            AppError::from(e)
        })?;

    Ok(Json(report))
}
