use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::player::PlayerService;
use crate::services::user::{UserService, UserUpdate};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show).put(update).delete(delete))
}

async fn list(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(UserService::new(state.db.clone()).list(&current.user).await?))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(UserService::new(state.db.clone()).get(id).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UserUpdate>,
) -> AppResult<impl IntoResponse> {
    let user = UserService::new(state.db.clone())
        .update(&current.user, id, input)
        .await?;
    Ok(Json(user))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    UserService::new(state.db.clone())
        .delete(&current.user, id)
        .await?;
    PlayerService::new(state.db.clone(), state.players.clone())
        .discard(id)
        .await;
    Ok(StatusCode::NO_CONTENT)
}
