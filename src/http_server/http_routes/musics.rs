use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{TypedHeader, headers::Range};

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::http_server::http_routes::media_file::serve_upload;
use crate::http_server::state::AppState;
use crate::services::music::{MusicFilter, MusicInput, MusicService};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/stream", get(stream))
        .route("/{id}/like", post(like))
}

async fn list(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<MusicFilter>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(MusicService::new(state.db.clone()).list(filter).await?))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(MusicService::new(state.db.clone()).get(id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<MusicInput>,
) -> AppResult<impl IntoResponse> {
    let music = MusicService::new(state.db.clone())
        .create(&current.user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(music)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<MusicInput>,
) -> AppResult<impl IntoResponse> {
    let music = MusicService::new(state.db.clone())
        .update(&current.user, id, input)
        .await?;
    Ok(Json(music))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    MusicService::new(state.db.clone())
        .delete(&current.user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    range: Option<TypedHeader<Range>>,
) -> AppResult<Response> {
    let upload = MusicService::new(state.db.clone())
        .stream_source(id)
        .await?;
    serve_upload(&upload, range).await
}

async fn like(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    MusicService::new(state.db.clone())
        .like(&current.user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
