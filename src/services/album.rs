use std::sync::Arc;

use chrono::Datelike;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::entities;
use crate::entities::review::ReviewTarget;
use crate::error::{AppError, AppResult};
use crate::services::artist::{ensure_can_manage, find_artist};
use crate::validation;

const EARLIEST_RELEASE_YEAR: i32 = 1800;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumInput {
    pub title: Option<String>,
    pub artist_id: Option<i64>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlbumDetail {
    pub album: entities::album::Model,
    pub musics: Vec<entities::music::Model>,
}

/// Look up an album or fail with 404.
pub(crate) async fn find_album<C: ConnectionTrait>(
    conn: &C,
    album_id: i64,
) -> AppResult<entities::album::Model> {
    entities::album::Entity::find_by_id(album_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Album not found: {album_id}")))
}

/// Recompute the denormalized track count and duration of an album from its musics.
pub(crate) async fn refresh_album_stats<C: ConnectionTrait>(
    conn: &C,
    album_id: i64,
) -> AppResult<()> {
    let musics = entities::music::Entity::find()
        .filter(entities::music::Column::AlbumId.eq(album_id))
        .all(conn)
        .await?;

    let track_count = musics.len() as i32;
    let duration: i32 = musics.iter().map(|m| m.duration).sum();

    let album = find_album(conn, album_id).await?;
    if album.track_count == track_count && album.duration == duration {
        return Ok(());
    }

    let mut model: entities::album::ActiveModel = album.into();
    model.track_count = Set(track_count);
    model.duration = Set(duration);
    model.update(conn).await?;

    tracing::debug!(album_id, track_count, duration, "Refreshed album stats");
    Ok(())
}

fn check_release_year(year: Option<i32>) -> AppResult<Option<i32>> {
    let latest = chrono::Utc::now().year() + 1;
    match year {
        Some(y) if !(EARLIEST_RELEASE_YEAR..=latest).contains(&y) => Err(AppError::bad_request(
            format!("releaseYear must be between {EARLIEST_RELEASE_YEAR} and {latest}"),
        )),
        _ => Ok(year),
    }
}

pub struct AlbumService {
    db: Arc<Database>,
}

impl AlbumService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, artist_id: Option<i64>) -> AppResult<Vec<entities::album::Model>> {
        let mut query = entities::album::Entity::find();
        if let Some(artist_id) = artist_id {
            query = query.filter(entities::album::Column::ArtistId.eq(artist_id));
        }

        Ok(query
            .order_by_asc(entities::album::Column::TitleKey)
            .all(&self.db.conn)
            .await?)
    }

    pub async fn get_detail(&self, album_id: i64) -> AppResult<AlbumDetail> {
        let album = find_album(&self.db.conn, album_id).await?;

        // Numbered tracks first, in order, then unnumbered ones by title
        let musics = entities::music::Entity::find()
            .filter(entities::music::Column::AlbumId.eq(album_id))
            .order_by_asc(Expr::cust("track_number IS NULL"))
            .order_by_asc(entities::music::Column::TrackNumber)
            .order_by_asc(entities::music::Column::TitleKey)
            .all(&self.db.conn)
            .await?;

        Ok(AlbumDetail { album, musics })
    }

    pub async fn create(
        &self,
        actor: &entities::user::Model,
        input: AlbumInput,
    ) -> AppResult<entities::album::Model> {
        let title = validation::required("title", input.title.as_deref())?;
        let artist_id = input
            .artist_id
            .ok_or_else(|| AppError::bad_request("artistId is required"))?;
        let release_year = check_release_year(input.release_year)?;

        let artist = find_artist(&self.db.conn, artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let title_key = validation::name_key(&title);
        self.ensure_title_available(artist_id, &title_key, None)
            .await?;

        let album = entities::album::ActiveModel {
            title: Set(title),
            title_key: Set(title_key),
            artist_id: Set(artist_id),
            release_year: Set(release_year),
            genre: Set(validation::optional(input.genre)),
            cover_url: Set(validation::optional(input.cover_url)),
            track_count: Set(0),
            duration: Set(0),
            ..Default::default()
        }
        .insert(&self.db.conn)
        .await?;

        tracing::info!(album_id = album.id, artist_id, title = %album.title, "Created album");
        Ok(album)
    }

    pub async fn update(
        &self,
        actor: &entities::user::Model,
        album_id: i64,
        input: AlbumInput,
    ) -> AppResult<entities::album::Model> {
        let album = find_album(&self.db.conn, album_id).await?;
        let artist = find_artist(&self.db.conn, album.artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        if input.artist_id.is_some_and(|id| id != album.artist_id) {
            return Err(AppError::bad_request(
                "An album cannot be moved to another artist",
            ));
        }

        let artist_id = album.artist_id;
        let mut model: entities::album::ActiveModel = album.into();

        if let Some(title) = input.title {
            let title = validation::required("title", Some(&title))?;
            let title_key = validation::name_key(&title);
            self.ensure_title_available(artist_id, &title_key, Some(album_id))
                .await?;
            model.title = Set(title);
            model.title_key = Set(title_key);
        }
        if input.release_year.is_some() {
            model.release_year = Set(check_release_year(input.release_year)?);
        }
        if input.genre.is_some() {
            model.genre = Set(validation::optional(input.genre));
        }
        if input.cover_url.is_some() {
            model.cover_url = Set(validation::optional(input.cover_url));
        }

        Ok(model.update(&self.db.conn).await?)
    }

    /// Delete an album. Its musics stay in the catalogue as singles.
    pub async fn delete(&self, actor: &entities::user::Model, album_id: i64) -> AppResult<()> {
        let album = find_album(&self.db.conn, album_id).await?;
        let artist = find_artist(&self.db.conn, album.artist_id).await?;
        ensure_can_manage(actor, &artist)?;

        let txn = self.db.conn.begin().await?;

        entities::music::Entity::update_many()
            .col_expr(
                entities::music::Column::AlbumId,
                Expr::value(Option::<i64>::None),
            )
            .filter(entities::music::Column::AlbumId.eq(album_id))
            .exec(&txn)
            .await?;

        entities::review::Entity::delete_many()
            .filter(entities::review::Column::TargetType.eq(ReviewTarget::Album))
            .filter(entities::review::Column::TargetId.eq(album_id))
            .exec(&txn)
            .await?;

        entities::album::Entity::delete_by_id(album_id)
            .exec(&txn)
            .await?;

        txn.commit().await?;

        tracing::info!(album_id, "Deleted album");
        Ok(())
    }

    async fn ensure_title_available(
        &self,
        artist_id: i64,
        title_key: &str,
        except_id: Option<i64>,
    ) -> AppResult<()> {
        let mut query = entities::album::Entity::find()
            .filter(entities::album::Column::ArtistId.eq(artist_id))
            .filter(entities::album::Column::TitleKey.eq(title_key));
        if let Some(id) = except_id {
            query = query.filter(entities::album::Column::Id.ne(id));
        }

        if query.one(&self.db.conn).await?.is_some() {
            return Err(AppError::conflict(
                "This artist already has an album with this title",
            ));
        }
        Ok(())
    }
}
