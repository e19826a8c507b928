use axum::response::{IntoResponse, Response};
use axum_extra::{TypedHeader, headers::Range};
use axum_range::{KnownSize, Ranged};
use color_eyre::eyre::Context;
use tokio::fs::File;

use crate::entities;
use crate::error::{AppError, AppResult};

/// Stream a stored upload, honouring an optional `Range` header.
pub async fn serve_upload(
    upload: &entities::upload::Model,
    range: Option<TypedHeader<Range>>,
) -> AppResult<Response> {
    let file = match File::open(&upload.stored_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!(
                "Upload {} points at a missing file: {}",
                upload.id,
                upload.stored_path
            );
            return Err(AppError::not_found(format!(
                "File of upload {} is missing",
                upload.id
            )));
        }
        Err(e) => {
            return Err(AppError::Internal(
                color_eyre::Report::new(e).wrap_err("Failed to open media file"),
            ));
        }
    };

    let body = KnownSize::file(file)
        .await
        .wrap_err("Failed to get file size")?;

    let range = range.map(|TypedHeader(range)| range);
    let mut response = Ranged::new(range, body).into_response();
    if let Ok(content_type) = upload.mime_type.parse() {
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}
