use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::database::Database;
use crate::entities;
use crate::entities::activity::ActivityKind;
use crate::error::{AppError, AppResult};
use crate::player::{PlaybackState, Player, PlayerSnapshot, RepeatMode, Track};
use crate::services::activity::ActivityService;
use crate::services::music::MusicService;

/// Live player sessions keyed by user id.
pub type PlayerSessions = Arc<Mutex<HashMap<i64, Player>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInput {
    pub music_ids: Vec<i64>,
    #[serde(default)]
    pub start_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SeekInput {
    pub position: f64,
}

#[derive(Debug, Deserialize)]
pub struct ShuffleInput {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RepeatInput {
    pub mode: RepeatMode,
}

#[derive(Debug, Deserialize)]
pub struct VolumeInput {
    pub volume: f32,
    pub muted: Option<bool>,
}

/// Activity to record once the session lock is released.
struct Event {
    kind: ActivityKind,
    music_id: i64,
    details: Option<String>,
}

impl Event {
    fn new(kind: ActivityKind, track: Track) -> Self {
        Self {
            kind,
            music_id: track.music_id,
            details: None,
        }
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

pub struct PlayerService {
    db: Arc<Database>,
    sessions: PlayerSessions,
}

impl PlayerService {
    pub fn new(db: Arc<Database>, sessions: PlayerSessions) -> Self {
        Self { db, sessions }
    }

    pub async fn snapshot(&self, user: &entities::user::Model) -> PlayerSnapshot {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user.id)
            .map(Player::snapshot)
            .unwrap_or_else(|| Player::new().snapshot())
    }

    /// Drop the session of `user_id`, if any.
    pub async fn discard(&self, user_id: i64) {
        if self.sessions.lock().await.remove(&user_id).is_some() {
            log::debug!("Discarded player session of user {user_id}");
        }
    }

    pub async fn load_queue(
        &self,
        user: &entities::user::Model,
        input: QueueInput,
    ) -> AppResult<PlayerSnapshot> {
        let tracks = self.load_tracks(&input.music_ids).await?;

        let (snapshot, track) = self
            .with_player(user, |player| {
                let track = player.load(tracks, input.start_index, &mut SmallRng::from_entropy())?;
                Ok(track)
            })
            .await?;

        self.record(user, vec![Event::new(ActivityKind::Play, track)])
            .await?;
        Ok(snapshot)
    }

    pub async fn play(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let before = player.play()?;
                Ok(play_event(player, before))
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    pub async fn pause(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let was_playing = player.state() == PlaybackState::Playing;
                player.pause()?;
                Ok(was_playing
                    .then(|| player.current())
                    .flatten()
                    .map(|track| Event::new(ActivityKind::Pause, track)))
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    pub async fn toggle(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let before = player.state();
                let after = player.toggle()?;
                let current = player.current();
                Ok(match after {
                    PlaybackState::Paused => {
                        current.map(|track| Event::new(ActivityKind::Pause, track))
                    }
                    _ => play_event(player, before),
                })
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    pub async fn seek(
        &self,
        user: &entities::user::Model,
        input: SeekInput,
    ) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let position = player.seek(input.position)?;
                Ok(player.current().map(|track| {
                    Event::new(ActivityKind::Seek, track)
                        .with_details(format!("position={position:.1}"))
                }))
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    pub async fn next(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let skipped = player.current();
                player.next()?;
                Ok(skipped.map(|track| Event::new(ActivityKind::Skip, track)))
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    pub async fn previous(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, event) = self
            .with_player(user, |player| {
                let skipped = player.current();
                player.previous()?;
                Ok(skipped.map(|track| {
                    Event::new(ActivityKind::Skip, track).with_details("previous".to_string())
                }))
            })
            .await?;
        self.record(user, event.into_iter().collect()).await?;
        Ok(snapshot)
    }

    /// The current track played to the end.
    pub async fn ended(&self, user: &entities::user::Model) -> AppResult<PlayerSnapshot> {
        let (snapshot, finished) = self
            .with_player(user, |player| Ok(player.ended()?.0))
            .await?;

        match MusicService::new(self.db.clone())
            .record_play(finished.music_id)
            .await
        {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                log::debug!(
                    "Music {} was deleted mid-session, not counting the play",
                    finished.music_id
                );
            }
            Err(e) => return Err(e),
        }
        self.record(user, vec![Event::new(ActivityKind::Complete, finished)])
            .await?;
        Ok(snapshot)
    }

    pub async fn set_shuffle(
        &self,
        user: &entities::user::Model,
        input: ShuffleInput,
    ) -> AppResult<PlayerSnapshot> {
        let (snapshot, ()) = self
            .with_player(user, |player| {
                player.set_shuffle(input.enabled, &mut SmallRng::from_entropy());
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    pub async fn set_repeat(
        &self,
        user: &entities::user::Model,
        input: RepeatInput,
    ) -> AppResult<PlayerSnapshot> {
        let (snapshot, ()) = self
            .with_player(user, |player| {
                player.set_repeat(input.mode);
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    pub async fn set_volume(
        &self,
        user: &entities::user::Model,
        input: VolumeInput,
    ) -> AppResult<PlayerSnapshot> {
        let (snapshot, ()) = self
            .with_player(user, |player| player.set_volume(input.volume, input.muted))
            .await?;
        Ok(snapshot)
    }

    /// Run `f` against the user's session, creating it on first use.
    /// The session is left untouched when `f` fails.
    async fn with_player<T>(
        &self,
        user: &entities::user::Model,
        f: impl FnOnce(&mut Player) -> AppResult<T>,
    ) -> AppResult<(PlayerSnapshot, T)> {
        let mut sessions = self.sessions.lock().await;
        let mut player = sessions.get(&user.id).cloned().unwrap_or_default();
        let out = f(&mut player)?;
        let snapshot = player.snapshot();
        sessions.insert(user.id, player);
        Ok((snapshot, out))
    }

    async fn load_tracks(&self, music_ids: &[i64]) -> AppResult<Vec<Track>> {
        if music_ids.is_empty() {
            return Err(AppError::bad_request("The queue cannot be empty"));
        }

        let durations: HashMap<i64, i32> = entities::music::Entity::find()
            .filter(entities::music::Column::Id.is_in(music_ids.iter().copied()))
            .all(&self.db.conn)
            .await?
            .into_iter()
            .map(|music| (music.id, music.duration))
            .collect();

        music_ids
            .iter()
            .map(|&music_id| {
                durations
                    .get(&music_id)
                    .map(|&duration| Track {
                        music_id,
                        duration: f64::from(duration),
                    })
                    .ok_or_else(|| AppError::not_found(format!("Music not found: {music_id}")))
            })
            .collect()
    }

    /// Log `events`. Queued musics can be deleted while a session holds
    /// them; those activities are kept without a music reference.
    async fn record(&self, user: &entities::user::Model, events: Vec<Event>) -> AppResult<()> {
        let activities = ActivityService::new(self.db.clone());
        for event in events {
            let music_id = entities::music::Entity::find_by_id(event.music_id)
                .one(&self.db.conn)
                .await?
                .map(|music| music.id);
            activities
                .log(user.id, event.kind, music_id, event.details)
                .await?;
        }
        Ok(())
    }
}

/// `play` coming out of a pause is a resume.
fn play_event(player: &Player, before: PlaybackState) -> Option<Event> {
    let track = player.current()?;
    match before {
        PlaybackState::Playing => None,
        PlaybackState::Paused => Some(Event::new(ActivityKind::Resume, track)),
        PlaybackState::Stopped => Some(Event::new(ActivityKind::Play, track)),
    }
}
