use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::entities;
use crate::error::{AppError, AppResult};
use crate::services::ensure_owner_or_admin;
use crate::services::music::find_music;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    /// Initial contents, only used on creation
    pub music_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetail {
    pub playlist: entities::playlist::Model,
    pub musics: Vec<entities::music::Model>,
}

/// Look up a playlist or fail with 404.
pub(crate) async fn find_playlist<C: ConnectionTrait>(
    conn: &C,
    playlist_id: i64,
) -> AppResult<entities::playlist::Model> {
    entities::playlist::Entity::find_by_id(playlist_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Playlist not found: {playlist_id}")))
}

/// Renumber a playlist's entries to 0..n-1, keeping their order.
pub(crate) async fn compact_positions<C: ConnectionTrait>(
    conn: &C,
    playlist_id: i64,
) -> AppResult<()> {
    let entries = entities::playlist_music::Entity::find()
        .filter(entities::playlist_music::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(entities::playlist_music::Column::Position)
        .all(conn)
        .await?;

    for (index, entry) in entries.into_iter().enumerate() {
        let index = index as i32;
        if entry.position != index {
            let mut model: entities::playlist_music::ActiveModel = entry.into();
            model.position = Set(index);
            model.update(conn).await?;
        }
    }
    Ok(())
}

fn can_view(viewer: Option<&entities::user::Model>, playlist: &entities::playlist::Model) -> bool {
    playlist.is_public
        || viewer.is_some_and(|user| user.is_admin() || user.id == playlist.owner_id)
}

pub struct PlaylistService {
    db: Arc<Database>,
}

impl PlaylistService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Public playlists plus the viewer's own ones.
    pub async fn list(
        &self,
        viewer: Option<&entities::user::Model>,
    ) -> AppResult<Vec<entities::playlist::Model>> {
        let mut visible = Condition::any().add(entities::playlist::Column::IsPublic.eq(true));
        if let Some(viewer) = viewer {
            visible = visible.add(entities::playlist::Column::OwnerId.eq(viewer.id));
        }

        Ok(entities::playlist::Entity::find()
            .filter(visible)
            .order_by_asc(entities::playlist::Column::NameKey)
            .order_by_asc(entities::playlist::Column::Id)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get_detail(
        &self,
        viewer: Option<&entities::user::Model>,
        playlist_id: i64,
    ) -> AppResult<PlaylistDetail> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        if !can_view(viewer, &playlist) {
            return Err(AppError::forbidden("This playlist is private"));
        }
        self.detail(playlist).await
    }

    pub async fn create(
        &self,
        actor: &entities::user::Model,
        input: PlaylistInput,
    ) -> AppResult<PlaylistDetail> {
        let name = validation::required("name", input.name.as_deref())?;
        let name_key = validation::name_key(&name);
        self.ensure_name_available(actor.id, &name_key, None)
            .await?;

        let music_ids = input.music_ids.unwrap_or_default();
        let mut seen = HashSet::new();
        for music_id in &music_ids {
            if !seen.insert(*music_id) {
                return Err(AppError::bad_request(format!(
                    "Music {music_id} appears more than once"
                )));
            }
            find_music(&self.db.conn, *music_id).await?;
        }

        let txn = self.db.conn.begin().await?;

        let playlist = entities::playlist::ActiveModel {
            name: Set(name),
            name_key: Set(name_key),
            description: Set(validation::optional(input.description)),
            owner_id: Set(actor.id),
            is_public: Set(input.is_public.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let now = Utc::now().timestamp();
        for (position, music_id) in music_ids.iter().enumerate() {
            entities::playlist_music::ActiveModel {
                playlist_id: Set(playlist.id),
                music_id: Set(*music_id),
                position: Set(position as i32),
                added_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        tracing::info!(playlist_id = playlist.id, owner_id = actor.id, "Created playlist");
        self.detail(playlist).await
    }

    pub async fn update(
        &self,
        actor: &entities::user::Model,
        playlist_id: i64,
        input: PlaylistInput,
    ) -> AppResult<entities::playlist::Model> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        ensure_owner_or_admin(actor, Some(playlist.owner_id))?;

        let owner_id = playlist.owner_id;
        let mut model: entities::playlist::ActiveModel = playlist.into();

        if let Some(name) = input.name {
            let name = validation::required("name", Some(&name))?;
            let name_key = validation::name_key(&name);
            self.ensure_name_available(owner_id, &name_key, Some(playlist_id))
                .await?;
            model.name = Set(name);
            model.name_key = Set(name_key);
        }
        if input.description.is_some() {
            model.description = Set(validation::optional(input.description));
        }
        if let Some(is_public) = input.is_public {
            model.is_public = Set(is_public);
        }

        Ok(model.update(&self.db.conn).await?)
    }

    pub async fn delete(&self, actor: &entities::user::Model, playlist_id: i64) -> AppResult<()> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        ensure_owner_or_admin(actor, Some(playlist.owner_id))?;

        let txn = self.db.conn.begin().await?;
        entities::playlist_music::Entity::delete_many()
            .filter(entities::playlist_music::Column::PlaylistId.eq(playlist_id))
            .exec(&txn)
            .await?;
        entities::playlist::Entity::delete_by_id(playlist_id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(playlist_id, "Deleted playlist");
        Ok(())
    }

    /// Append a music to the end of a playlist.
    pub async fn add_music(
        &self,
        actor: &entities::user::Model,
        playlist_id: i64,
        music_id: i64,
    ) -> AppResult<PlaylistDetail> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        ensure_owner_or_admin(actor, Some(playlist.owner_id))?;
        find_music(&self.db.conn, music_id).await?;

        let existing = entities::playlist_music::Entity::find_by_id((playlist_id, music_id))
            .one(&self.db.conn)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict("Music is already in the playlist"));
        }

        let txn = self.db.conn.begin().await?;

        let position = entities::playlist_music::Entity::find()
            .filter(entities::playlist_music::Column::PlaylistId.eq(playlist_id))
            .count(&txn)
            .await?;

        entities::playlist_music::ActiveModel {
            playlist_id: Set(playlist_id),
            music_id: Set(music_id),
            position: Set(position as i32),
            added_at: Set(Utc::now().timestamp()),
        }
        .insert(&txn)
        .await?;

        let playlist = touch(&txn, playlist).await?;
        txn.commit().await?;

        self.detail(playlist).await
    }

    pub async fn remove_music(
        &self,
        actor: &entities::user::Model,
        playlist_id: i64,
        music_id: i64,
    ) -> AppResult<()> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        ensure_owner_or_admin(actor, Some(playlist.owner_id))?;

        let txn = self.db.conn.begin().await?;

        let result = entities::playlist_music::Entity::delete_by_id((playlist_id, music_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found(format!(
                "Music {music_id} is not in playlist {playlist_id}"
            )));
        }

        compact_positions(&txn, playlist_id).await?;
        touch(&txn, playlist).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Reorder a playlist. `music_ids` must be a permutation of its current contents.
    pub async fn reorder(
        &self,
        actor: &entities::user::Model,
        playlist_id: i64,
        music_ids: Vec<i64>,
    ) -> AppResult<PlaylistDetail> {
        let playlist = find_playlist(&self.db.conn, playlist_id).await?;
        ensure_owner_or_admin(actor, Some(playlist.owner_id))?;

        let txn = self.db.conn.begin().await?;

        let entries = entities::playlist_music::Entity::find()
            .filter(entities::playlist_music::Column::PlaylistId.eq(playlist_id))
            .all(&txn)
            .await?;

        let current: HashSet<i64> = entries.iter().map(|e| e.music_id).collect();
        let requested: HashSet<i64> = music_ids.iter().copied().collect();
        if requested.len() != music_ids.len() || requested != current {
            return Err(AppError::bad_request(
                "musicIds must list every music of the playlist exactly once",
            ));
        }

        for entry in entries {
            let position = music_ids
                .iter()
                .position(|id| *id == entry.music_id)
                .unwrap_or_default() as i32;
            if entry.position != position {
                let mut model: entities::playlist_music::ActiveModel = entry.into();
                model.position = Set(position);
                model.update(&txn).await?;
            }
        }

        let playlist = touch(&txn, playlist).await?;
        txn.commit().await?;

        self.detail(playlist).await
    }

    async fn detail(&self, playlist: entities::playlist::Model) -> AppResult<PlaylistDetail> {
        let entries = entities::playlist_music::Entity::find()
            .filter(entities::playlist_music::Column::PlaylistId.eq(playlist.id))
            .order_by_asc(entities::playlist_music::Column::Position)
            .all(&self.db.conn)
            .await?;

        let mut musics = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(music) = entities::music::Entity::find_by_id(entry.music_id)
                .one(&self.db.conn)
                .await?
            {
                musics.push(music);
            }
        }

        Ok(PlaylistDetail { playlist, musics })
    }

    async fn ensure_name_available(
        &self,
        owner_id: i64,
        name_key: &str,
        except_id: Option<i64>,
    ) -> AppResult<()> {
        let mut query = entities::playlist::Entity::find()
            .filter(entities::playlist::Column::OwnerId.eq(owner_id))
            .filter(entities::playlist::Column::NameKey.eq(name_key));
        if let Some(id) = except_id {
            query = query.filter(entities::playlist::Column::Id.ne(id));
        }

        if query.one(&self.db.conn).await?.is_some() {
            return Err(AppError::conflict(
                "You already have a playlist with this name",
            ));
        }
        Ok(())
    }
}

/// Bump a playlist's `updated_at` through `before_save`.
async fn touch<C: ConnectionTrait>(
    conn: &C,
    playlist: entities::playlist::Model,
) -> AppResult<entities::playlist::Model> {
    let model: entities::playlist::ActiveModel = playlist.into();
    Ok(model.update(conn).await?)
}
