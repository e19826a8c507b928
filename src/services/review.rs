use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::entities;
use crate::entities::review::ReviewTarget;
use crate::error::{AppError, AppResult};
use crate::services::album::find_album;
use crate::services::artist::find_artist;
use crate::services::ensure_owner_or_admin;
use crate::services::music::find_music;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub target_type: Option<ReviewTarget>,
    pub target_id: Option<i64>,
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    pub target_type: Option<ReviewTarget>,
    pub target_id: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub count: u64,
    pub average: f64,
}

fn check_rating(rating: i32) -> AppResult<i32> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::bad_request("rating must be between 1 and 5"));
    }
    Ok(rating)
}

pub struct ReviewService {
    db: Arc<Database>,
}

impl ReviewService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: ReviewFilter) -> AppResult<Vec<entities::review::Model>> {
        let mut query = entities::review::Entity::find();
        if let Some(target_type) = filter.target_type {
            query = query.filter(entities::review::Column::TargetType.eq(target_type));
        }
        if let Some(target_id) = filter.target_id {
            query = query.filter(entities::review::Column::TargetId.eq(target_id));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(entities::review::Column::UserId.eq(user_id));
        }

        Ok(query
            .order_by_desc(entities::review::Column::CreatedAt)
            .order_by_desc(entities::review::Column::Id)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get(&self, review_id: i64) -> AppResult<entities::review::Model> {
        entities::review::Entity::find_by_id(review_id)
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Review not found: {review_id}")))
    }

    pub async fn summary(&self, target_type: ReviewTarget, target_id: i64) -> AppResult<ReviewSummary> {
        self.ensure_target_exists(target_type, target_id).await?;

        let reviews = entities::review::Entity::find()
            .filter(entities::review::Column::TargetType.eq(target_type))
            .filter(entities::review::Column::TargetId.eq(target_id))
            .all(&self.db.conn)
            .await?;

        let count = reviews.len() as u64;
        let average = if reviews.is_empty() {
            0.0
        } else {
            reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64
        };

        Ok(ReviewSummary { count, average })
    }

    pub async fn create(
        &self,
        actor: &entities::user::Model,
        input: ReviewInput,
    ) -> AppResult<entities::review::Model> {
        let target_type = input
            .target_type
            .ok_or_else(|| AppError::bad_request("targetType is required"))?;
        let target_id = input
            .target_id
            .ok_or_else(|| AppError::bad_request("targetId is required"))?;
        let rating = check_rating(
            input
                .rating
                .ok_or_else(|| AppError::bad_request("rating is required"))?,
        )?;

        self.ensure_target_exists(target_type, target_id).await?;

        let existing = entities::review::Entity::find()
            .filter(entities::review::Column::UserId.eq(actor.id))
            .filter(entities::review::Column::TargetType.eq(target_type))
            .filter(entities::review::Column::TargetId.eq(target_id))
            .one(&self.db.conn)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("You have already reviewed this item"));
        }

        let review = entities::review::ActiveModel {
            user_id: Set(actor.id),
            target_type: Set(target_type),
            target_id: Set(target_id),
            rating: Set(rating),
            comment: Set(validation::optional(input.comment)),
            ..Default::default()
        }
        .insert(&self.db.conn)
        .await?;

        tracing::info!(review_id = review.id, user_id = actor.id, "Created review");
        Ok(review)
    }

    /// Only the author may edit a review.
    pub async fn update(
        &self,
        actor: &entities::user::Model,
        review_id: i64,
        input: ReviewInput,
    ) -> AppResult<entities::review::Model> {
        let review = self.get(review_id).await?;
        if review.user_id != actor.id {
            return Err(AppError::forbidden("Only the author can edit a review"));
        }

        let mut model: entities::review::ActiveModel = review.into();
        if let Some(rating) = input.rating {
            model.rating = Set(check_rating(rating)?);
        }
        if input.comment.is_some() {
            model.comment = Set(validation::optional(input.comment));
        }

        Ok(model.update(&self.db.conn).await?)
    }

    pub async fn delete(&self, actor: &entities::user::Model, review_id: i64) -> AppResult<()> {
        let review = self.get(review_id).await?;
        ensure_owner_or_admin(actor, Some(review.user_id))?;

        entities::review::Entity::delete_by_id(review_id)
            .exec(&self.db.conn)
            .await?;
        Ok(())
    }

    async fn ensure_target_exists(&self, target_type: ReviewTarget, target_id: i64) -> AppResult<()> {
        match target_type {
            ReviewTarget::Music => find_music(&self.db.conn, target_id).await.map(|_| ()),
            ReviewTarget::Album => find_album(&self.db.conn, target_id).await.map(|_| ()),
            ReviewTarget::Artist => find_artist(&self.db.conn, target_id).await.map(|_| ()),
        }
    }
}
