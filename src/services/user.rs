use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Deserialize;

use crate::database::Database;
use crate::entities;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::services::auth::{ensure_identity_available, hash_password};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
}

fn ensure_self_or_admin(actor: &entities::user::Model, user_id: i64) -> AppResult<()> {
    if actor.id == user_id || actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("You can only manage your own account"))
    }
}

pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, actor: &entities::user::Model) -> AppResult<Vec<entities::user::Model>> {
        if !actor.is_admin() {
            return Err(AppError::forbidden("Only admins can list users"));
        }
        Ok(entities::user::Entity::find()
            .order_by_asc(entities::user::Column::Username)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get(&self, user_id: i64) -> AppResult<entities::user::Model> {
        entities::user::Entity::find_by_id(user_id)
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User not found: {user_id}")))
    }

    pub async fn update(
        &self,
        actor: &entities::user::Model,
        user_id: i64,
        input: UserUpdate,
    ) -> AppResult<entities::user::Model> {
        ensure_self_or_admin(actor, user_id)?;
        let user = self.get(user_id).await?;

        if input.role.is_some_and(|role| role != user.role) && !actor.is_admin() {
            return Err(AppError::forbidden("Only admins can change roles"));
        }

        let username = match input.username.as_deref() {
            Some(value) => validation::normalize_username(value)?,
            None => user.username.clone(),
        };
        let email = match input.email.as_deref() {
            Some(value) => validation::normalize_email(value)?,
            None => user.email.clone(),
        };
        if username != user.username || email != user.email {
            ensure_identity_available(&self.db, &username, &email, Some(user.id)).await?;
        }

        let mut model: entities::user::ActiveModel = user.into();
        model.username = Set(username);
        model.email = Set(email);
        if input.display_name.is_some() {
            model.display_name = Set(validation::optional(input.display_name));
        }
        if let Some(password) = input.password {
            validation::check_password(&password)?;
            model.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = input.role {
            model.role = Set(role);
        }

        let updated = model.update(&self.db.conn).await?;
        tracing::info!(user_id, "Updated user");
        Ok(updated)
    }

    /// Delete an account together with its sessions, playlists, reviews and activities.
    /// Catalogue records and uploads it owned are kept without an owner.
    pub async fn delete(&self, actor: &entities::user::Model, user_id: i64) -> AppResult<()> {
        ensure_self_or_admin(actor, user_id)?;
        self.get(user_id).await?;

        let txn = self.db.conn.begin().await?;

        entities::session::Entity::delete_many()
            .filter(entities::session::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let playlist_ids: Vec<i64> = entities::playlist::Entity::find()
            .select_only()
            .column(entities::playlist::Column::Id)
            .filter(entities::playlist::Column::OwnerId.eq(user_id))
            .into_tuple()
            .all(&txn)
            .await?;
        entities::playlist_music::Entity::delete_many()
            .filter(entities::playlist_music::Column::PlaylistId.is_in(playlist_ids))
            .exec(&txn)
            .await?;
        entities::playlist::Entity::delete_many()
            .filter(entities::playlist::Column::OwnerId.eq(user_id))
            .exec(&txn)
            .await?;

        entities::review::Entity::delete_many()
            .filter(entities::review::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        entities::activity::Entity::delete_many()
            .filter(entities::activity::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        entities::artist::Entity::update_many()
            .col_expr(
                entities::artist::Column::OwnerId,
                Expr::value(Option::<i64>::None),
            )
            .filter(entities::artist::Column::OwnerId.eq(user_id))
            .exec(&txn)
            .await?;
        entities::upload::Entity::update_many()
            .col_expr(
                entities::upload::Column::OwnerId,
                Expr::value(Option::<i64>::None),
            )
            .filter(entities::upload::Column::OwnerId.eq(user_id))
            .exec(&txn)
            .await?;

        entities::user::Entity::delete_by_id(user_id)
            .exec(&txn)
            .await?;

        txn.commit().await?;

        tracing::info!(user_id, deleted_by = actor.id, "Deleted user");
        Ok(())
    }
}
