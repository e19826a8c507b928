use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Deserialize;

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::album::{AlbumInput, AlbumService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumQuery {
    artist_id: Option<i64>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}

async fn list(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<AlbumQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        AlbumService::new(state.db.clone())
            .list(query.artist_id)
            .await?,
    ))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(AlbumService::new(state.db.clone()).get_detail(id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<AlbumInput>,
) -> AppResult<impl IntoResponse> {
    let album = AlbumService::new(state.db.clone())
        .create(&current.user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(album)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<AlbumInput>,
) -> AppResult<impl IntoResponse> {
    let album = AlbumService::new(state.db.clone())
        .update(&current.user, id, input)
        .await?;
    Ok(Json(album))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    AlbumService::new(state.db.clone())
        .delete(&current.user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
