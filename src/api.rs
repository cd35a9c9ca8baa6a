//! Thin HTTP surface over the job controllers.
//!
//! `POST /jobs/news` and `POST /jobs/terms` run one invocation each and map
//! the outcome: success and partial success are 200 (the body carries the
//! `success` flag), full failure and timeout are 500 with the error list.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::jobs::news::{NewsJob, NewsPayload};
use crate::jobs::terms::TermsJob;
use crate::jobs::{JobResult, TermRecord};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsJob>,
    pub terms: Arc<TermsJob>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/jobs/news", post(run_news))
        .route("/jobs/terms", post(run_terms))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn status_for<P>(result: &JobResult<P>) -> StatusCode {
    if result.success || result.partial_success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn run_news(State(state): State<AppState>) -> (StatusCode, Json<JobResult<NewsPayload>>) {
    let result = state.news.execute().await;
    (status_for(&result), Json(result))
}

async fn run_terms(
    State(state): State<AppState>,
) -> (StatusCode, Json<JobResult<Vec<TermRecord>>>) {
    let result = state.terms.execute().await;
    (status_for(&result), Json(result))
}
