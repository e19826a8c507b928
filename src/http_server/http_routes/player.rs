use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::player::{
    PlayerService, QueueInput, RepeatInput, SeekInput, ShuffleInput, VolumeInput,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(snapshot))
        .route("/queue", post(queue))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/toggle", post(toggle))
        .route("/seek", post(seek))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .route("/ended", post(ended))
        .route("/shuffle", post(shuffle))
        .route("/repeat", post(repeat))
        .route("/volume", post(volume))
}

fn service(state: &AppState) -> PlayerService {
    PlayerService::new(state.db.clone(), state.players.clone())
}

async fn snapshot(State(state): State<Arc<AppState>>, current: CurrentUser) -> impl IntoResponse {
    Json(service(&state).snapshot(&current.user).await)
}

async fn queue(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<QueueInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).load_queue(&current.user, input).await?))
}

async fn play(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).play(&current.user).await?))
}

async fn pause(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).pause(&current.user).await?))
}

async fn toggle(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).toggle(&current.user).await?))
}

async fn seek(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<SeekInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).seek(&current.user, input).await?))
}

async fn next(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).next(&current.user).await?))
}

async fn previous(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).previous(&current.user).await?))
}

async fn ended(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).ended(&current.user).await?))
}

async fn shuffle(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<ShuffleInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).set_shuffle(&current.user, input).await?))
}

async fn repeat(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<RepeatInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).set_repeat(&current.user, input).await?))
}

async fn volume(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiJson(input): ApiJson<VolumeInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).set_volume(&current.user, input).await?))
}
