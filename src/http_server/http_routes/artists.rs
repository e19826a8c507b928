use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Deserialize;

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::artist::{ArtistInput, ArtistService};

#[derive(Debug, Deserialize)]
struct ArtistQuery {
    search: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}

async fn list(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ArtistQuery>,
) -> AppResult<impl IntoResponse> {
    let artists = ArtistService::new(state.db.clone())
        .list(query.search.as_deref())
        .await?;
    Ok(Json(artists))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ArtistService::new(state.db.clone()).get_detail(id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<ArtistInput>,
) -> AppResult<impl IntoResponse> {
    let artist = ArtistService::new(state.db.clone())
        .create(&current.user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(artist)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ArtistInput>,
) -> AppResult<impl IntoResponse> {
    let artist = ArtistService::new(state.db.clone())
        .update(&current.user, id, input)
        .await?;
    Ok(Json(artist))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    ArtistService::new(state.db.clone())
        .delete(&current.user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
