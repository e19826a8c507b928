use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, ExprTrait},
};
use serde::Deserialize;

use crate::database::Database;
use crate::entities;
use crate::entities::activity::ActivityKind;
use crate::entities::review::ReviewTarget;
use crate::entities::upload::MediaKind;
use crate::error::{AppError, AppResult};
use crate::services::activity::ActivityService;
use crate::services::album::{find_album, refresh_album_stats};
use crate::services::artist::{ensure_can_manage, find_artist};
use crate::services::deserialize_nullable;
use crate::services::playlist::compact_positions;
use crate::services::upload::find_upload;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicInput {
    pub title: Option<String>,
    pub artist_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub album_id: Option<Option<i64>>,
    pub duration: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub track_number: Option<Option<i32>>,
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub upload_id: Option<Option<i64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicFilter {
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub genre: Option<String>,
    pub search: Option<String>,
}

/// Look up a music or fail with 404.
pub(crate) async fn find_music<C: ConnectionTrait>(
    conn: &C,
    music_id: i64,
) -> AppResult<entities::music::Model> {
    entities::music::Entity::find_by_id(music_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Music not found: {music_id}")))
}

fn check_duration(duration: i32) -> AppResult<i32> {
    if duration < 0 {
        return Err(AppError::bad_request("duration must not be negative"));
    }
    Ok(duration)
}

fn check_track_number(track_number: Option<i32>) -> AppResult<Option<i32>> {
    if track_number.is_some_and(|n| n < 1) {
        return Err(AppError::bad_request("trackNumber must be positive"));
    }
    Ok(track_number)
}

pub struct MusicService {
    db: Arc<Database>,
}

impl MusicService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: MusicFilter) -> AppResult<Vec<entities::music::Model>> {
        let mut query = entities::music::Entity::find();
        if let Some(artist_id) = filter.artist_id {
            query = query.filter(entities::music::Column::ArtistId.eq(artist_id));
        }
        if let Some(album_id) = filter.album_id {
            query = query.filter(entities::music::Column::AlbumId.eq(album_id));
        }
        if let Some(genre) = validation::optional(filter.genre) {
            query = query.filter(entities::music::Column::Genre.eq(genre));
        }
        if let Some(search) = filter
            .search
            .as_deref()
            .map(validation::name_key)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(entities::music::Column::TitleKey.contains(search.as_str()));
        }

        Ok(query
            .order_by_asc(entities::music::Column::TitleKey)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get(&self, music_id: i64) -> AppResult<entities::music::Model> {
        find_music(&self.db.conn, music_id).await
    }

    pub async fn create(
        &self,
        actor: &entities::user::Model,
        input: MusicInput,
    ) -> AppResult<entities::music::Model> {
        let title = validation::required("title", input.title.as_deref())?;
        let artist_id = input
            .artist_id
            .ok_or_else(|| AppError::bad_request("artistId is required"))?;
        let duration = check_duration(
            input
                .duration
                .ok_or_else(|| AppError::bad_request("duration is required"))?,
        )?;
        let track_number = check_track_number(input.track_number.flatten())?;

        let artist = find_artist(&self.db.conn, artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let album_id = input.album_id.flatten();
        if let Some(album_id) = album_id {
            self.check_album(album_id, artist_id).await?;
        }
        let upload_id = input.upload_id.flatten();
        if let Some(upload_id) = upload_id {
            self.check_upload(upload_id).await?;
        }

        let title_key = validation::name_key(&title);
        self.ensure_title_available(artist_id, &title_key, None)
            .await?;

        let txn = self.db.conn.begin().await?;

        let music = entities::music::ActiveModel {
            title: Set(title),
            title_key: Set(title_key),
            artist_id: Set(artist_id),
            album_id: Set(album_id),
            duration: Set(duration),
            track_number: Set(track_number),
            genre: Set(validation::optional(input.genre)),
            upload_id: Set(upload_id),
            play_count: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if let Some(album_id) = album_id {
            refresh_album_stats(&txn, album_id).await?;
        }

        txn.commit().await?;

        tracing::info!(music_id = music.id, artist_id, title = %music.title, "Created music");
        Ok(music)
    }

    pub async fn update(
        &self,
        actor: &entities::user::Model,
        music_id: i64,
        input: MusicInput,
    ) -> AppResult<entities::music::Model> {
        let music = find_music(&self.db.conn, music_id).await?;
        let artist = find_artist(&self.db.conn, music.artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        if input.artist_id.is_some_and(|id| id != music.artist_id) {
            return Err(AppError::bad_request(
                "A music cannot be moved to another artist",
            ));
        }

        let artist_id = music.artist_id;
        let previous_album = music.album_id;
        let mut model: entities::music::ActiveModel = music.into();

        if let Some(title) = input.title {
            let title = validation::required("title", Some(&title))?;
            let title_key = validation::name_key(&title);
            self.ensure_title_available(artist_id, &title_key, Some(music_id))
                .await?;
            model.title = Set(title);
            model.title_key = Set(title_key);
        }
        if let Some(album_id) = input.album_id {
            if let Some(album_id) = album_id {
                self.check_album(album_id, artist_id).await?;
            }
            model.album_id = Set(album_id);
        }
        if let Some(duration) = input.duration {
            model.duration = Set(check_duration(duration)?);
        }
        if let Some(track_number) = input.track_number {
            model.track_number = Set(check_track_number(track_number)?);
        }
        if input.genre.is_some() {
            model.genre = Set(validation::optional(input.genre));
        }
        if let Some(upload_id) = input.upload_id {
            if let Some(upload_id) = upload_id {
                self.check_upload(upload_id).await?;
            }
            model.upload_id = Set(upload_id);
        }

        let txn = self.db.conn.begin().await?;
        let music = model.update(&txn).await?;

        if let Some(album_id) = previous_album {
            refresh_album_stats(&txn, album_id).await?;
        }
        if let Some(album_id) = music.album_id.filter(|id| Some(*id) != previous_album) {
            refresh_album_stats(&txn, album_id).await?;
        }

        txn.commit().await?;
        Ok(music)
    }

    /// Delete a music, removing it from playlists and refreshing its album.
    pub async fn delete(&self, actor: &entities::user::Model, music_id: i64) -> AppResult<()> {
        let music = find_music(&self.db.conn, music_id).await?;
        let artist = find_artist(&self.db.conn, music.artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let txn = self.db.conn.begin().await?;

        let memberships = entities::playlist_music::Entity::find()
            .filter(entities::playlist_music::Column::MusicId.eq(music_id))
            .all(&txn)
            .await?;
        entities::playlist_music::Entity::delete_many()
            .filter(entities::playlist_music::Column::MusicId.eq(music_id))
            .exec(&txn)
            .await?;
        for membership in &memberships {
            compact_positions(&txn, membership.playlist_id).await?;
        }

        entities::review::Entity::delete_many()
            .filter(entities::review::Column::TargetType.eq(ReviewTarget::Music))
            .filter(entities::review::Column::TargetId.eq(music_id))
            .exec(&txn)
            .await?;

        entities::music::Entity::delete_by_id(music_id)
            .exec(&txn)
            .await?;

        if let Some(album_id) = music.album_id {
            refresh_album_stats(&txn, album_id).await?;
        }

        txn.commit().await?;

        tracing::info!(music_id, "Deleted music");
        Ok(())
    }

    /// Count a finished play.
    pub async fn record_play(&self, music_id: i64) -> AppResult<()> {
        let result = entities::music::Entity::update_many()
            .col_expr(
                entities::music::Column::PlayCount,
                Expr::col(entities::music::Column::PlayCount).add(1),
            )
            .filter(entities::music::Column::Id.eq(music_id))
            .exec(&self.db.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found(format!("Music not found: {music_id}")));
        }
        Ok(())
    }

    pub async fn like(&self, actor: &entities::user::Model, music_id: i64) -> AppResult<()> {
        find_music(&self.db.conn, music_id).await?;
        ActivityService::new(self.db.clone())
            .log(actor.id, ActivityKind::Like, Some(music_id), None)
            .await?;
        Ok(())
    }

    /// Path and mime type of the audio attached to a music.
    pub async fn stream_source(&self, music_id: i64) -> AppResult<entities::upload::Model> {
        let music = find_music(&self.db.conn, music_id).await?;
        let upload_id = music
            .upload_id
            .ok_or_else(|| AppError::not_found(format!("Music {music_id} has no audio file")))?;
        find_upload(&self.db.conn, upload_id).await
    }

    async fn check_album(&self, album_id: i64, artist_id: i64) -> AppResult<()> {
        let album = find_album(&self.db.conn, album_id).await?;
        if album.artist_id != artist_id {
            return Err(AppError::bad_request(
                "The album belongs to another artist",
            ));
        }
        Ok(())
    }

    async fn check_upload(&self, upload_id: i64) -> AppResult<()> {
        let upload = find_upload(&self.db.conn, upload_id).await?;
        if upload.kind != MediaKind::Audio {
            return Err(AppError::bad_request("The upload is not an audio file"));
        }
        Ok(())
    }

    async fn ensure_title_available(
        &self,
        artist_id: i64,
        title_key: &str,
        except_id: Option<i64>,
    ) -> AppResult<()> {
        let mut query = entities::music::Entity::find()
            .filter(entities::music::Column::ArtistId.eq(artist_id))
            .filter(entities::music::Column::TitleKey.eq(title_key));
        if let Some(id) = except_id {
            query = query.filter(entities::music::Column::Id.ne(id));
        }

        if query.one(&self.db.conn).await?.is_some() {
            return Err(AppError::conflict(
                "This artist already has a music with this title",
            ));
        }
        Ok(())
    }
}
