// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{freshness, report},
    state::AppState,
    utils::jwt::{auth_middleware, report_viewer_middleware},
};

/// Assembles the main application router.
///
/// * Scoreboard and freshness routes sit behind authentication and the
///   report-viewer check.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (attempt store, configuration).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/{quiz_id}/scoreboard", get(report::get_scoreboard))
        .route("/{quiz_id}/freshness", get(freshness::get_freshness))
        // Auth runs first, then the capability check
        .layer(middleware::from_fn(report_viewer_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
