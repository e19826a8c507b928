use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::database::Database;
use crate::entities;
use crate::entities::upload::MediaKind;
use crate::error::{AppError, AppResult};
use crate::file_hash::compute_sha256;
use crate::ports::media_store::MediaStore;
use crate::services::ensure_owner_or_admin;

pub(crate) async fn find_upload<C: ConnectionTrait>(
    conn: &C,
    upload_id: i64,
) -> AppResult<entities::upload::Model> {
    entities::upload::Entity::find_by_id(upload_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Upload not found: {upload_id}")))
}

/// Sniff the content type from the leading bytes.
fn detect_media(bytes: &[u8]) -> AppResult<(MediaKind, &'static str, &'static str)> {
    let kind = infer::get(bytes)
        .ok_or_else(|| AppError::bad_request("Unrecognised file type"))?;

    let media_kind = match kind.matcher_type() {
        infer::MatcherType::Audio => MediaKind::Audio,
        infer::MatcherType::Image => MediaKind::Image,
        _ => {
            return Err(AppError::bad_request(format!(
                "Unsupported file type: {}",
                kind.mime_type()
            )));
        }
    };

    Ok((media_kind, kind.mime_type(), kind.extension()))
}

fn clean_file_name(original_name: &str) -> String {
    let name = Path::new(original_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

pub struct UploadService {
    db: Arc<Database>,
    store: Arc<dyn MediaStore>,
    max_bytes: u64,
}

impl UploadService {
    pub fn new(db: Arc<Database>, store: Arc<dyn MediaStore>, max_bytes: u64) -> Self {
        Self {
            db,
            store,
            max_bytes,
        }
    }

    /// Validate, deduplicate and persist an uploaded file.
    pub async fn create(
        &self,
        actor: &entities::user::Model,
        original_name: &str,
        bytes: &[u8],
    ) -> AppResult<entities::upload::Model> {
        if bytes.is_empty() {
            return Err(AppError::bad_request("The file is empty"));
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(AppError::bad_request(format!(
                "The file exceeds the maximum size of {} bytes",
                self.max_bytes
            )));
        }

        let (kind, mime_type, extension) = detect_media(bytes)?;
        let sha256 = compute_sha256(bytes);

        let duplicate = entities::upload::Entity::find()
            .filter(entities::upload::Column::Sha256.eq(&sha256))
            .one(&self.db.conn)
            .await?;
        if let Some(duplicate) = duplicate {
            return Err(AppError::conflict(format!(
                "This file was already uploaded (upload {})",
                duplicate.id
            )));
        }

        // Claim the hash before any bytes reach the store.
        let txn = self.db.conn.begin().await?;
        let claimed = entities::upload::ActiveModel {
            owner_id: Set(Some(actor.id)),
            original_name: Set(clean_file_name(original_name)),
            stored_path: Set(String::new()),
            mime_type: Set(mime_type.to_string()),
            kind: Set(kind),
            size: Set(bytes.len() as i64),
            sha256: Set(sha256.clone()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("This file was already uploaded"),
            other => other,
        })?;

        let stored_path = match self.store.save(&format!("{sha256}.{extension}"), bytes).await {
            Ok(path) => path,
            Err(e) => {
                txn.rollback().await?;
                return Err(e.into());
            }
        };

        let mut upload: entities::upload::ActiveModel = claimed.into();
        upload.stored_path = Set(stored_path.display().to_string());
        let updated = upload.update(&txn).await;
        let finished = match updated {
            Ok(upload) => txn.commit().await.map(|()| upload),
            Err(e) => Err(e),
        };

        match finished {
            Ok(upload) => {
                tracing::info!(
                    upload_id = upload.id,
                    mime_type = %upload.mime_type,
                    size = upload.size,
                    "Stored upload"
                );
                Ok(upload)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.remove(&stored_path).await {
                    tracing::warn!("Failed to clean up {}: {cleanup}", stored_path.display());
                }
                Err(e.into())
            }
        }
    }

    pub async fn get(&self, upload_id: i64) -> AppResult<entities::upload::Model> {
        find_upload(&self.db.conn, upload_id).await
    }

    pub async fn delete(&self, actor: &entities::user::Model, upload_id: i64) -> AppResult<()> {
        let upload = find_upload(&self.db.conn, upload_id).await?;
        ensure_owner_or_admin(actor, upload.owner_id)?;

        let references = entities::music::Entity::find()
            .filter(entities::music::Column::UploadId.eq(upload_id))
            .count(&self.db.conn)
            .await?;
        if references > 0 {
            return Err(AppError::bad_request(
                "The upload is still used by a music",
            ));
        }

        entities::upload::Entity::delete_by_id(upload_id)
            .exec(&self.db.conn)
            .await?;
        self.store.remove(Path::new(&upload.stored_path)).await?;

        tracing::info!(upload_id, "Deleted upload");
        Ok(())
    }
}
