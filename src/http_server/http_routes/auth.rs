use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::error::AppResult;
use crate::http_server::extract::{ApiJson, CurrentUser};
use crate::http_server::state::AppState;
use crate::services::auth::{AuthService, LoginInput, RegisterInput};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.config.session_ttl_hours)
}

async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> AppResult<impl IntoResponse> {
    let session = service(&state).register(input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<LoginInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).login(input).await?))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> AppResult<StatusCode> {
    service(&state).logout(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(current: CurrentUser) -> impl IntoResponse {
    Json(current.user)
}
