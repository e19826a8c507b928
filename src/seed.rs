//! Demo catalogue for a fresh database.

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::database::Database;
use crate::entities;
use crate::entities::user::UserRole;
use crate::error::AppResult;
use crate::services::album::{AlbumInput, AlbumService};
use crate::services::artist::{ArtistInput, ArtistService};
use crate::services::auth::hash_password;
use crate::services::music::{MusicInput, MusicService};
use crate::services::playlist::{PlaylistInput, PlaylistService};
use crate::validation;

pub const SEED_ADMIN_USERNAME: &str = "admin";

struct DemoAlbum {
    title: &'static str,
    year: i32,
    tracks: &'static [(&'static str, i32)],
}

struct DemoArtist {
    name: &'static str,
    genre: &'static str,
    bio: &'static str,
    albums: &'static [DemoAlbum],
    singles: &'static [(&'static str, i32)],
}

const CATALOGUE: &[DemoArtist] = &[
    DemoArtist {
        name: "Bonga",
        genre: "Semba",
        bio: "Angolan singer and songwriter.",
        albums: &[DemoAlbum {
            title: "Angola 72",
            year: 1972,
            tracks: &[("Mona Ki Ngi Xica", 262), ("Muadiakime", 224), ("Kilumbu Dia Diala", 198)],
        }],
        singles: &[("Mariquinha", 241)],
    },
    DemoArtist {
        name: "Cesária Évora",
        genre: "Morna",
        bio: "The barefoot diva of Cape Verde.",
        albums: &[DemoAlbum {
            title: "Miss Perfumado",
            year: 1992,
            tracks: &[("Sodade", 286), ("Angola", 255), ("Lua Nha Testemunha", 301)],
        }],
        singles: &[],
    },
    DemoArtist {
        name: "Paulo Flores",
        genre: "Kizomba",
        bio: "Angolan musician known for semba and kizomba.",
        albums: &[],
        singles: &[("Poema do Semba", 275), ("Njila Ia Dikanga", 233)],
    },
];

#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub artists: usize,
    pub albums: usize,
    pub musics: usize,
    pub playlists: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Load the demo catalogue when the database has no artists yet.
///
/// The catalogue is owned by the `admin` account, which is created with
/// `admin_password` when missing.
pub async fn seed(db: Arc<Database>, admin_password: &str) -> AppResult<SeedReport> {
    let mut report = SeedReport::default();

    if entities::artist::Entity::find().count(&db.conn).await? > 0 {
        log::info!("Database already has artists, skipping seed");
        return Ok(report);
    }

    let admin = seed_admin(&db, admin_password).await?;

    let artists = ArtistService::new(db.clone());
    let albums = AlbumService::new(db.clone());
    let musics = MusicService::new(db.clone());
    let mut playlist_ids = Vec::new();

    for demo in CATALOGUE {
        let artist = artists
            .create(
                &admin,
                ArtistInput {
                    name: Some(demo.name.to_string()),
                    bio: Some(demo.bio.to_string()),
                    genre: Some(demo.genre.to_string()),
                    image_url: None,
                },
            )
            .await?;
        report.artists += 1;

        for demo_album in demo.albums {
            let album = albums
                .create(
                    &admin,
                    AlbumInput {
                        title: Some(demo_album.title.to_string()),
                        artist_id: Some(artist.id),
                        release_year: Some(demo_album.year),
                        genre: Some(demo.genre.to_string()),
                        cover_url: None,
                    },
                )
                .await?;
            report.albums += 1;

            for (number, (title, duration)) in demo_album.tracks.iter().enumerate() {
                let music = musics
                    .create(
                        &admin,
                        MusicInput {
                            title: Some(title.to_string()),
                            artist_id: Some(artist.id),
                            album_id: Some(Some(album.id)),
                            duration: Some(*duration),
                            track_number: Some(Some(number as i32 + 1)),
                            genre: Some(demo.genre.to_string()),
                            upload_id: None,
                        },
                    )
                    .await?;
                report.musics += 1;
                if number == 0 {
                    playlist_ids.push(music.id);
                }
            }
        }

        for (title, duration) in demo.singles {
            let music = musics
                .create(
                    &admin,
                    MusicInput {
                        title: Some(title.to_string()),
                        artist_id: Some(artist.id),
                        duration: Some(*duration),
                        genre: Some(demo.genre.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            report.musics += 1;
            playlist_ids.push(music.id);
        }
    }

    PlaylistService::new(db)
        .create(
            &admin,
            PlaylistInput {
                name: Some("Clássicos da Lusofonia".to_string()),
                description: Some("A taste of the demo catalogue".to_string()),
                is_public: Some(true),
                music_ids: Some(playlist_ids),
            },
        )
        .await?;
    report.playlists += 1;

    log::info!(
        "Seeded {} artists, {} albums, {} musics and {} playlists",
        report.artists,
        report.albums,
        report.musics,
        report.playlists
    );
    Ok(report)
}

async fn seed_admin(db: &Database, password: &str) -> AppResult<entities::user::Model> {
    let existing = entities::user::Entity::find()
        .filter(entities::user::Column::Username.eq(SEED_ADMIN_USERNAME))
        .one(&db.conn)
        .await?;
    if let Some(admin) = existing {
        if !admin.is_admin() {
            log::warn!("Seeding the catalogue as non-admin user '{SEED_ADMIN_USERNAME}'");
        }
        return Ok(admin);
    }

    validation::check_password(password)?;
    let password_hash = hash_password(password)?;
    let admin = entities::user::ActiveModel {
        username: Set(SEED_ADMIN_USERNAME.to_string()),
        email: Set(format!("{SEED_ADMIN_USERNAME}@ispmedia.local")),
        display_name: Set(Some("ISPmedia Admin".to_string())),
        role: Set(UserRole::Admin),
        password_hash: Set(password_hash),
        ..Default::default()
    }
    .insert(&db.conn)
    .await?;

    log::info!("Created seed admin account '{SEED_ADMIN_USERNAME}'");
    Ok(admin)
}
