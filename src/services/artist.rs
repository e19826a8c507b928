use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::entities;
use crate::entities::review::ReviewTarget;
use crate::error::{AppError, AppResult};
use crate::services::ensure_owner_or_admin;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistInput {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub genre: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArtistDetail {
    pub artist: entities::artist::Model,
    pub albums: Vec<entities::album::Model>,
    pub musics: Vec<entities::music::Model>,
}

/// Look up an artist or fail with 404.
pub(crate) async fn find_artist<C: ConnectionTrait>(
    conn: &C,
    artist_id: i64,
) -> AppResult<entities::artist::Model> {
    entities::artist::Entity::find_by_id(artist_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Artist not found: {artist_id}")))
}

/// Catalogue writes need the artist or admin role and, for artists, ownership.
pub(crate) fn ensure_can_manage(
    actor: &entities::user::Model,
    artist: &entities::artist::Model,
) -> AppResult<()> {
    if !actor.can_publish() {
        return Err(AppError::forbidden(
            "Only artists and admins can manage the catalogue",
        ));
    }
    ensure_owner_or_admin(actor, artist.owner_id)
}

pub struct ArtistService {
    db: Arc<Database>,
}

impl ArtistService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, search: Option<&str>) -> AppResult<Vec<entities::artist::Model>> {
        let mut query = entities::artist::Entity::find();
        if let Some(search) = search.map(validation::name_key).filter(|s| !s.is_empty()) {
            query = query.filter(entities::artist::Column::NameKey.contains(search.as_str()));
        }

        Ok(query
            .order_by_asc(entities::artist::Column::NameKey)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get_detail(&self, artist_id: i64) -> AppResult<ArtistDetail> {
        let artist = find_artist(&self.db.conn, artist_id).await?;

        let albums = entities::album::Entity::find()
            .filter(entities::album::Column::ArtistId.eq(artist_id))
            .order_by_asc(entities::album::Column::TitleKey)
            .all(&self.db.conn)
            .await?;

        let musics = entities::music::Entity::find()
            .filter(entities::music::Column::ArtistId.eq(artist_id))
            .order_by_asc(entities::music::Column::TitleKey)
            .all(&self.db.conn)
            .await?;

        Ok(ArtistDetail {
            artist,
            albums,
            musics,
        })
    }

    pub async fn create(
        &self,
        actor: &entities::user::Model,
        input: ArtistInput,
    ) -> AppResult<entities::artist::Model> {
        if !actor.can_publish() {
            return Err(AppError::forbidden(
                "Only artists and admins can manage the catalogue",
            ));
        }

        let name = validation::required("name", input.name.as_deref())?;
        let name_key = validation::name_key(&name);
        self.ensure_name_available(&name_key, None).await?;

        let artist = entities::artist::ActiveModel {
            name: Set(name),
            name_key: Set(name_key),
            bio: Set(validation::optional(input.bio)),
            genre: Set(validation::optional(input.genre)),
            image_url: Set(validation::optional(input.image_url)),
            owner_id: Set(Some(actor.id)),
            ..Default::default()
        }
        .insert(&self.db.conn)
        .await?;

        tracing::info!(artist_id = artist.id, name = %artist.name, "Created artist");
        Ok(artist)
    }

    pub async fn update(
        &self,
        actor: &entities::user::Model,
        artist_id: i64,
        input: ArtistInput,
    ) -> AppResult<entities::artist::Model> {
        let artist = find_artist(&self.db.conn, artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let mut model: entities::artist::ActiveModel = artist.into();

        if let Some(name) = input.name {
            let name = validation::required("name", Some(&name))?;
            let name_key = validation::name_key(&name);
            self.ensure_name_available(&name_key, Some(artist_id))
                .await?;
            model.name = Set(name);
            model.name_key = Set(name_key);
        }
        if input.bio.is_some() {
            model.bio = Set(validation::optional(input.bio));
        }
        if input.genre.is_some() {
            model.genre = Set(validation::optional(input.genre));
        }
        if input.image_url.is_some() {
            model.image_url = Set(validation::optional(input.image_url));
        }

        Ok(model.update(&self.db.conn).await?)
    }

    /// Delete an artist. Artists that still have albums or musics are kept.
    pub async fn delete(&self, actor: &entities::user::Model, artist_id: i64) -> AppResult<()> {
        let artist = find_artist(&self.db.conn, artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let album_count = entities::album::Entity::find()
            .filter(entities::album::Column::ArtistId.eq(artist_id))
            .count(&self.db.conn)
            .await?;
        if album_count > 0 {
            return Err(AppError::bad_request(format!(
                "Artist still has {album_count} album(s)"
            )));
        }

        let music_count = entities::music::Entity::find()
            .filter(entities::music::Column::ArtistId.eq(artist_id))
            .count(&self.db.conn)
            .await?;
        if music_count > 0 {
            return Err(AppError::bad_request(format!(
                "Artist still has {music_count} music(s)"
            )));
        }

        let txn = self.db.conn.begin().await?;
        entities::review::Entity::delete_many()
            .filter(entities::review::Column::TargetType.eq(ReviewTarget::Artist))
            .filter(entities::review::Column::TargetId.eq(artist_id))
            .exec(&txn)
            .await?;
        entities::artist::Entity::delete_by_id(artist_id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(artist_id, "Deleted artist");
        Ok(())
    }

    async fn ensure_name_available(&self, name_key: &str, except_id: Option<i64>) -> AppResult<()> {
        let mut query =
            entities::artist::Entity::find().filter(entities::artist::Column::NameKey.eq(name_key));
        if let Some(id) = except_id {
            query = query.filter(entities::artist::Column::Id.ne(id));
        }

        if query.one(&self.db.conn).await?.is_some() {
            return Err(AppError::conflict("An artist with this name already exists"));
        }
        Ok(())
    }
}
