use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Deserialize;

use crate::database::Database;
use crate::entities;
use crate::entities::activity::ActivityKind;
use crate::error::{AppError, AppResult};
use crate::services::music::find_music;
use crate::validation;

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    #[serde(rename = "type")]
    pub kind: Option<ActivityKind>,
    pub music_id: Option<i64>,
    pub details: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityFilter {
    #[serde(rename = "type")]
    pub kind: Option<ActivityKind>,
    pub limit: Option<u64>,
}

pub struct ActivityService {
    db: Arc<Database>,
}

impl ActivityService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record an interaction of `user_id`.
    pub async fn log(
        &self,
        user_id: i64,
        kind: ActivityKind,
        music_id: Option<i64>,
        details: Option<String>,
    ) -> AppResult<entities::activity::Model> {
        let activity = entities::activity::ActiveModel {
            user_id: Set(user_id),
            kind: Set(kind),
            music_id: Set(music_id),
            details: Set(validation::optional(details)),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        }
        .insert(&self.db.conn)
        .await?;

        tracing::debug!(user_id, %kind, ?music_id, "Logged activity");
        Ok(activity)
    }

    /// Validate and record an activity reported by a client.
    pub async fn record(
        &self,
        actor: &entities::user::Model,
        input: ActivityInput,
    ) -> AppResult<entities::activity::Model> {
        let kind = input
            .kind
            .ok_or_else(|| AppError::bad_request("type is required"))?;
        if let Some(music_id) = input.music_id {
            find_music(&self.db.conn, music_id).await?;
        }
        self.log(actor.id, kind, input.music_id, input.details)
            .await
    }

    /// Newest first.
    pub async fn list(
        &self,
        user_id: i64,
        filter: ActivityFilter,
    ) -> AppResult<Vec<entities::activity::Model>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let mut query = entities::activity::Entity::find()
            .filter(entities::activity::Column::UserId.eq(user_id));
        if let Some(kind) = filter.kind {
            query = query.filter(entities::activity::Column::Kind.eq(kind));
        }

        Ok(query
            .order_by_desc(entities::activity::Column::CreatedAt)
            .order_by_desc(entities::activity::Column::Id)
            .limit(limit)
            .all(&self.db.conn)
            .await?)
    }

    /// Another user's history, visible to that user and admins.
    pub async fn list_for(
        &self,
        actor: &entities::user::Model,
        user_id: i64,
        filter: ActivityFilter,
    ) -> AppResult<Vec<entities::activity::Model>> {
        if actor.id != user_id && !actor.is_admin() {
            return Err(AppError::forbidden(
                "You can only view your own activity",
            ));
        }
        entities::user::Entity::find_by_id(user_id)
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {user_id}")))?;

        self.list(user_id, filter).await
    }

    pub async fn clear(&self, user_id: i64) -> AppResult<u64> {
        let result = entities::activity::Entity::delete_many()
            .filter(entities::activity::Column::UserId.eq(user_id))
            .exec(&self.db.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::test_utils::{create_artist, create_music, create_user, test_db};

    #[tokio::test]
    async fn test_record_and_list_newest_first() {
        let db = test_db().await;
        let user = create_user(&db, "listener", UserRole::User).await;
        let owner = create_user(&db, "owner", UserRole::Artist).await;
        let artist = create_artist(&db, &owner, "Cartola").await;
        let music = create_music(&db, &artist, None, "O Mundo é um Moinho", 200).await;
        let service = ActivityService::new(db);

        for kind in [ActivityKind::Play, ActivityKind::Pause, ActivityKind::Like] {
            service
                .record(
                    &user,
                    ActivityInput {
                        kind: Some(kind),
                        music_id: Some(music.id),
                        details: None,
                    },
                )
                .await
                .unwrap();
        }

        let all = service.list(user.id, ActivityFilter::default()).await.unwrap();
        let kinds: Vec<_> = all.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::Like, ActivityKind::Pause, ActivityKind::Play]
        );

        let pauses = service
            .list(
                user.id,
                ActivityFilter {
                    kind: Some(ActivityKind::Pause),
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(pauses.len(), 1);

        let limited = service
            .list(
                user.id,
                ActivityFilter {
                    kind: None,
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_record_validation() {
        let db = test_db().await;
        let user = create_user(&db, "listener", UserRole::User).await;
        let service = ActivityService::new(db);

        assert!(matches!(
            service
                .record(
                    &user,
                    ActivityInput {
                        kind: None,
                        music_id: None,
                        details: None
                    }
                )
                .await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service
                .record(
                    &user,
                    ActivityInput {
                        kind: Some(ActivityKind::Play),
                        music_id: Some(42),
                        details: None
                    }
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_other_user() {
        let db = test_db().await;
        let user = create_user(&db, "listener", UserRole::User).await;
        let other = create_user(&db, "other", UserRole::User).await;
        let admin = create_user(&db, "admin", UserRole::Admin).await;
        let service = ActivityService::new(db);
        service
            .log(user.id, ActivityKind::Play, None, Some("radio".into()))
            .await
            .unwrap();

        assert!(matches!(
            service
                .list_for(&other, user.id, ActivityFilter::default())
                .await,
            Err(AppError::Forbidden(_))
        ));
        let seen = service
            .list_for(&admin, user.id, ActivityFilter::default())
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].details.as_deref(), Some("radio"));
        assert!(matches!(
            service
                .list_for(&admin, 999, ActivityFilter::default())
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let db = test_db().await;
        let user = create_user(&db, "listener", UserRole::User).await;
        let other = create_user(&db, "other", UserRole::User).await;
        let service = ActivityService::new(db);
        service.log(user.id, ActivityKind::Play, None, None).await.unwrap();
        service.log(other.id, ActivityKind::Play, None, None).await.unwrap();

        assert_eq!(service.clear(user.id).await.unwrap(), 1);
        assert!(service
            .list(user.id, ActivityFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            service
                .list(other.id, ActivityFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
