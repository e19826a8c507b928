use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::activity::{ActivityFilter, ActivityInput, ActivityService};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create).delete(clear))
        .route("/{user_id}", get(list_for_user))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<ActivityInput>,
) -> AppResult<impl IntoResponse> {
    let activity = ActivityService::new(state.db.clone())
        .record(&current.user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn list(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiQuery(filter): ApiQuery<ActivityFilter>,
) -> AppResult<impl IntoResponse> {
    let activities = ActivityService::new(state.db.clone())
        .list(current.user.id, filter)
        .await?;
    Ok(Json(activities))
}

async fn list_for_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiQuery(filter): ApiQuery<ActivityFilter>,
) -> AppResult<impl IntoResponse> {
    let activities = ActivityService::new(state.db.clone())
        .list_for(&current.user, user_id, filter)
        .await?;
    Ok(Json(activities))
}

async fn clear(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<StatusCode> {
    let removed = ActivityService::new(state.db.clone())
        .clear(current.user.id)
        .await?;
    log::debug!("Cleared {removed} activities of user {}", current.user.id);
    Ok(StatusCode::NO_CONTENT)
}
