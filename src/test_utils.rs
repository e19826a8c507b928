use std::sync::{Arc, LazyLock};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};

use crate::database::Database;
use crate::entities;
use crate::entities::upload::MediaKind;
use crate::entities::user::UserRole;
use crate::services::auth::hash_password;
use crate::validation::name_key;

pub const TEST_PASSWORD: &str = "correct horse";

/// Hashing is slow on purpose, so fixtures share one hash.
static TEST_PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(TEST_PASSWORD).unwrap());

pub async fn test_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().await.unwrap())
}

/// User with email `<username>@example.com` and password [`TEST_PASSWORD`].
pub async fn create_user(db: &Database, username: &str, role: UserRole) -> entities::user::Model {
    entities::user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        role: Set(role),
        password_hash: Set(TEST_PASSWORD_HASH.clone()),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

pub async fn create_artist(
    db: &Database,
    owner: &entities::user::Model,
    name: &str,
) -> entities::artist::Model {
    entities::artist::ActiveModel {
        name: Set(name.to_string()),
        name_key: Set(name_key(name)),
        owner_id: Set(Some(owner.id)),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

pub async fn create_album(
    db: &Database,
    artist: &entities::artist::Model,
    title: &str,
) -> entities::album::Model {
    entities::album::ActiveModel {
        title: Set(title.to_string()),
        title_key: Set(name_key(title)),
        artist_id: Set(artist.id),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

/// Inserts the row only; album counters are not refreshed.
pub async fn create_music(
    db: &Database,
    artist: &entities::artist::Model,
    album: Option<&entities::album::Model>,
    title: &str,
    duration: i32,
) -> entities::music::Model {
    entities::music::ActiveModel {
        title: Set(title.to_string()),
        title_key: Set(name_key(title)),
        artist_id: Set(artist.id),
        album_id: Set(album.map(|a| a.id)),
        duration: Set(duration),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

pub async fn create_playlist(
    db: &Database,
    owner: &entities::user::Model,
    name: &str,
    music_ids: &[i64],
) -> entities::playlist::Model {
    let playlist = entities::playlist::ActiveModel {
        name: Set(name.to_string()),
        name_key: Set(name_key(name)),
        owner_id: Set(owner.id),
        is_public: Set(true),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap();

    for (position, music_id) in music_ids.iter().enumerate() {
        entities::playlist_music::ActiveModel {
            playlist_id: Set(playlist.id),
            music_id: Set(*music_id),
            position: Set(position as i32),
            added_at: Set(Utc::now().timestamp()),
        }
        .insert(&db.conn)
        .await
        .unwrap();
    }

    playlist
}

pub async fn create_upload(
    db: &Database,
    owner: &entities::user::Model,
    kind: MediaKind,
    sha256: &str,
) -> entities::upload::Model {
    let (mime_type, extension) = match kind {
        MediaKind::Audio => ("audio/mpeg", "mp3"),
        MediaKind::Image => ("image/png", "png"),
    };
    entities::upload::ActiveModel {
        owner_id: Set(Some(owner.id)),
        original_name: Set(format!("{sha256}.{extension}")),
        stored_path: Set(format!("/nonexistent/{sha256}.{extension}")),
        mime_type: Set(mime_type.to_string()),
        kind: Set(kind),
        size: Set(3),
        sha256: Set(sha256.to_string()),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}
