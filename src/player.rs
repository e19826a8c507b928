//! In-memory playback session of one listener.
//!
//! The queue keeps the order the listener loaded; `order` holds the play
//! order as indices into the queue and is only different from `0..len`
//! while shuffle is on.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Going back within this many seconds of a track moves to the previous one.
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub music_id: i64,
    /// Seconds
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub queue: Vec<i64>,
    pub current_index: Option<usize>,
    pub current_music_id: Option<i64>,
    pub position: f64,
    pub duration: f64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    pub muted: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    state: PlaybackState,
    queue: Vec<Track>,
    order: Vec<usize>,
    cursor: usize,
    position: f64,
    shuffle: bool,
    repeat: RepeatMode,
    volume: f32,
    muted: bool,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            queue: Vec::new(),
            order: Vec::new(),
            cursor: 0,
            position: 0.0,
            shuffle: false,
            repeat: RepeatMode::Off,
            volume: 1.0,
            muted: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn current(&self) -> Option<Track> {
        self.order
            .get(self.cursor)
            .and_then(|&index| self.queue.get(index))
            .copied()
    }

    fn current_index(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }

    fn require_current(&self) -> AppResult<Track> {
        self.current()
            .ok_or_else(|| AppError::bad_request("Nothing is queued"))
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let current = self.current();
        PlayerSnapshot {
            state: self.state,
            queue: self.queue.iter().map(|t| t.music_id).collect(),
            current_index: self.current_index(),
            current_music_id: current.map(|t| t.music_id),
            position: self.position,
            duration: current.map(|t| t.duration).unwrap_or(0.0),
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
            muted: self.muted,
        }
    }

    /// Replace the queue and start playing `start_index`.
    pub fn load<R: Rng + ?Sized>(
        &mut self,
        tracks: Vec<Track>,
        start_index: usize,
        rng: &mut R,
    ) -> AppResult<Track> {
        if tracks.is_empty() {
            return Err(AppError::bad_request("The queue cannot be empty"));
        }
        if start_index >= tracks.len() {
            return Err(AppError::bad_request(format!(
                "startIndex {start_index} is out of range"
            )));
        }

        self.queue = tracks;
        self.rebuild_order(start_index, rng);
        self.position = 0.0;
        self.state = PlaybackState::Playing;
        self.require_current()
    }

    fn rebuild_order<R: Rng + ?Sized>(&mut self, current: usize, rng: &mut R) {
        if self.shuffle {
            let mut rest: Vec<usize> = (0..self.queue.len()).filter(|&i| i != current).collect();
            rest.shuffle(rng);
            self.order = std::iter::once(current).chain(rest).collect();
            self.cursor = 0;
        } else {
            self.order = (0..self.queue.len()).collect();
            self.cursor = current;
        }
    }

    /// Start or resume. Returns the state it was in before.
    pub fn play(&mut self) -> AppResult<PlaybackState> {
        self.require_current()?;
        let previous = self.state;
        self.state = PlaybackState::Playing;
        Ok(previous)
    }

    pub fn pause(&mut self) -> AppResult<()> {
        self.require_current()?;
        self.state = PlaybackState::Paused;
        Ok(())
    }

    /// Flip between playing and paused. Returns the new state.
    pub fn toggle(&mut self) -> AppResult<PlaybackState> {
        if self.state == PlaybackState::Playing {
            self.pause()?;
        } else {
            self.play()?;
        }
        Ok(self.state)
    }

    /// Move the playhead. The position is clamped to the track length.
    pub fn seek(&mut self, position: f64) -> AppResult<f64> {
        if !position.is_finite() || position < 0.0 {
            return Err(AppError::bad_request(
                "position must be a non-negative number",
            ));
        }
        let track = self.require_current()?;
        self.position = position.min(track.duration);
        Ok(self.position)
    }

    /// Advance in play order. Returns the new track, or `None` when playback stopped
    /// at the end of the order.
    pub fn next(&mut self) -> AppResult<Option<Track>> {
        self.require_current()?;
        self.position = 0.0;

        if self.cursor + 1 < self.order.len() {
            self.cursor += 1;
        } else if self.repeat == RepeatMode::All {
            self.cursor = 0;
        } else {
            self.state = PlaybackState::Stopped;
            return Ok(None);
        }

        self.state = PlaybackState::Playing;
        Ok(self.current())
    }

    /// Restart the track, or step back when it only just started.
    pub fn previous(&mut self) -> AppResult<Track> {
        self.require_current()?;

        if self.position <= RESTART_THRESHOLD_SECS {
            if self.cursor > 0 {
                self.cursor -= 1;
            } else if self.repeat == RepeatMode::All {
                self.cursor = self.order.len() - 1;
            }
        }

        self.position = 0.0;
        self.state = PlaybackState::Playing;
        self.require_current()
    }

    /// The current track finished. Returns the finished track and the next one, if any.
    pub fn ended(&mut self) -> AppResult<(Track, Option<Track>)> {
        let finished = self.require_current()?;
        if self.repeat == RepeatMode::One {
            self.position = 0.0;
            self.state = PlaybackState::Playing;
            return Ok((finished, Some(finished)));
        }
        let next = self.next()?;
        Ok((finished, next))
    }

    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;
        if let Some(current) = self.current_index() {
            self.rebuild_order(current, rng);
        }
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn set_volume(&mut self, volume: f32, muted: Option<bool>) -> AppResult<()> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(AppError::bad_request("volume must be between 0 and 1"));
        }
        self.volume = volume;
        if let Some(muted) = muted {
            self.muted = muted;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn tracks(n: i64) -> Vec<Track> {
        (1..=n)
            .map(|music_id| Track {
                music_id,
                duration: 100.0,
            })
            .collect()
    }

    fn loaded(n: i64) -> Player {
        let mut player = Player::new();
        player
            .load(tracks(n), 0, &mut StdRng::seed_from_u64(7))
            .unwrap();
        player
    }

    fn current_id(player: &Player) -> Option<i64> {
        player.current().map(|t| t.music_id)
    }

    #[test]
    fn test_new_player() {
        let player = Player::new();
        let snapshot = player.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Stopped);
        assert!(snapshot.queue.is_empty());
        assert_eq!(snapshot.current_index, None);
        assert_eq!(snapshot.volume, 1.0);
        assert!(!snapshot.muted);
    }

    #[test]
    fn test_controls_require_a_track() {
        let mut player = Player::new();
        assert!(matches!(player.play(), Err(AppError::BadRequest(_))));
        assert!(matches!(player.pause(), Err(AppError::BadRequest(_))));
        assert!(matches!(player.seek(1.0), Err(AppError::BadRequest(_))));
        assert!(matches!(player.next(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_load_validation() {
        let mut player = Player::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(player.load(Vec::new(), 0, &mut rng).is_err());
        assert!(player.load(tracks(2), 2, &mut rng).is_err());

        let track = player.load(tracks(3), 1, &mut rng).unwrap();
        assert_eq!(track.music_id, 2);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.snapshot().current_index, Some(1));
    }

    #[test]
    fn test_toggle() {
        let mut player = loaded(1);
        assert_eq!(player.toggle().unwrap(), PlaybackState::Paused);
        assert_eq!(player.toggle().unwrap(), PlaybackState::Playing);
        assert_eq!(player.play().unwrap(), PlaybackState::Playing);
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut player = loaded(1);
        assert_eq!(player.seek(42.5).unwrap(), 42.5);
        assert_eq!(player.seek(500.0).unwrap(), 100.0);
        assert!(player.seek(-1.0).is_err());
        assert!(player.seek(f64::NAN).is_err());
        assert_eq!(player.position(), 100.0);
    }

    #[test]
    fn test_next_without_repeat_stops_at_end() {
        let mut player = loaded(2);
        assert_eq!(player.next().unwrap().map(|t| t.music_id), Some(2));
        assert_eq!(player.next().unwrap(), None);
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(current_id(&player), Some(2));
    }

    #[test]
    fn test_next_with_repeat_all_wraps() {
        let mut player = loaded(2);
        player.set_repeat(RepeatMode::All);
        player.next().unwrap();
        assert_eq!(player.next().unwrap().map(|t| t.music_id), Some(1));
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_previous_restarts_after_threshold() {
        let mut player = loaded(3);
        player.next().unwrap();
        player.seek(10.0).unwrap();

        assert_eq!(player.previous().unwrap().music_id, 2);
        assert_eq!(player.position(), 0.0);

        assert_eq!(player.previous().unwrap().music_id, 1);
        // first track without repeat stays put
        assert_eq!(player.previous().unwrap().music_id, 1);

        player.set_repeat(RepeatMode::All);
        assert_eq!(player.previous().unwrap().music_id, 3);
    }

    #[test]
    fn test_ended() {
        let mut player = loaded(2);
        player.set_repeat(RepeatMode::One);
        player.seek(99.0).unwrap();
        let (finished, next) = player.ended().unwrap();
        assert_eq!(finished.music_id, 1);
        assert_eq!(next.map(|t| t.music_id), Some(1));
        assert_eq!(player.position(), 0.0);

        player.set_repeat(RepeatMode::Off);
        let (_, next) = player.ended().unwrap();
        assert_eq!(next.map(|t| t.music_id), Some(2));
        let (finished, next) = player.ended().unwrap();
        assert_eq!(finished.music_id, 2);
        assert_eq!(next, None);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_shuffle_keeps_current_first() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut player = Player::new();
        player.load(tracks(6), 3, &mut rng).unwrap();

        player.set_shuffle(true, &mut rng);
        assert_eq!(current_id(&player), Some(4));

        let mut played = vec![4];
        while let Some(track) = player.next().unwrap() {
            played.push(track.music_id);
        }
        let mut sorted = played.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
        // the queue itself keeps its loaded order
        assert_eq!(player.snapshot().queue, vec![1, 2, 3, 4, 5, 6]);

        let last = current_id(&player);
        player.set_shuffle(false, &mut rng);
        assert_eq!(current_id(&player), last);
        assert_eq!(player.snapshot().current_index, last.map(|id| id as usize - 1));
    }

    #[test]
    fn test_volume() {
        let mut player = Player::new();
        player.set_volume(0.25, Some(true)).unwrap();
        assert_eq!(player.snapshot().volume, 0.25);
        assert!(player.snapshot().muted);

        player.set_volume(0.5, None).unwrap();
        assert!(player.snapshot().muted);

        assert!(player.set_volume(1.5, None).is_err());
        assert!(player.set_volume(-0.1, None).is_err());
    }
}
