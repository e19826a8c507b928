use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{TypedHeader, headers::Range};

use crate::error::{AppError, AppResult};
use crate::http_server::extract::{ApiPath, CurrentUser};
use crate::http_server::http_routes::media_file::serve_upload;
use crate::http_server::state::AppState;
use crate::services::upload::UploadService;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(show).delete(delete))
        .route("/{id}/file", get(file))
}

fn service(state: &AppState) -> UploadService {
    UploadService::new(
        state.db.clone(),
        state.media_store.clone(),
        state.config.max_upload_bytes,
    )
}

/// POST /api/upload, multipart with a `file` field
async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        file = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) = file.ok_or_else(|| AppError::bad_request("file is required"))?;
    let upload = service(&state)
        .create(&current.user, &file_name, &bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(upload)))
}

async fn show(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(service(&state).get(id).await?))
}

async fn file(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    range: Option<TypedHeader<Range>>,
) -> AppResult<Response> {
    let upload = service(&state).get(id).await?;
    serve_upload(&upload, range).await
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    service(&state).delete(&current.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
