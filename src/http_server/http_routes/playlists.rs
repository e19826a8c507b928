use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, CurrentUser, MaybeUser};
use crate::http_server::state::AppState;
use crate::services::playlist::{PlaylistInput, PlaylistService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMusicInput {
    music_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderInput {
    music_ids: Vec<i64>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route(
            "/{id}",
            get(show).put(update).delete(delete_playlist),
        )
        .route("/{id}/musics", post(add_music).put(reorder))
        .route("/{id}/musics/{music_id}", delete(remove_music))
}

fn service(state: &AppState) -> PlaylistService {
    PlaylistService::new(state.db.clone())
}

async fn list(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).list(viewer.as_ref()).await?))
}

async fn show(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).get_detail(viewer.as_ref(), id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<PlaylistInput>,
) -> AppResult<impl IntoResponse> {
    let detail = service(&state).create(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PlaylistInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).update(&current.user, id, input).await?))
}

async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    service(&state).delete(&current.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_music(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<AddMusicInput>,
) -> AppResult<impl IntoResponse> {
    let detail = service(&state)
        .add_music(&current.user, id, input.music_id)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn remove_music(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath((id, music_id)): ApiPath<(i64, i64)>,
) -> AppResult<StatusCode> {
    service(&state)
        .remove_music(&current.user, id, music_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReorderInput>,
) -> AppResult<impl IntoResponse> {
    let detail = service(&state)
        .reorder(&current.user, id, input.music_ids)
        .await?;
    Ok(Json(detail))
}
