use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Deserialize;

use crate::entities::review::ReviewTarget;
use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::review::{ReviewFilter, ReviewInput, ReviewService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryQuery {
    target_type: ReviewTarget,
    target_id: i64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/summary", get(summary))
        .route("/{id}", get(show).put(update).delete(delete))
}

async fn list(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<ReviewFilter>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ReviewService::new(state.db.clone()).list(filter).await?))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> AppResult<impl IntoResponse> {
    let summary = ReviewService::new(state.db.clone())
        .summary(query.target_type, query.target_id)
        .await?;
    Ok(Json(summary))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ReviewService::new(state.db.clone()).get(id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<ReviewInput>,
) -> AppResult<impl IntoResponse> {
    let review = ReviewService::new(state.db.clone())
        .create(&current.user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> AppResult<impl IntoResponse> {
    let review = ReviewService::new(state.db.clone())
        .update(&current.user, id, input)
        .await?;
    Ok(Json(review))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    ReviewService::new(state.db.clone())
        .delete(&current.user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
