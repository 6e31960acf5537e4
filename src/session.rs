//! The process-wide streaming session: one [`Library`] plus per-user
//! playback tracking, behind a single reader/writer lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{
    Library,
    LibraryError,
    LibraryStats,
    Playback,
    PlaybackError,
    Song,
    SongError,
    SongId,
    UserId,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Song(#[from] SongError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("no active user")]
    NoActiveUser,

    #[error("no active playback")]
    NoActivePlayback,

    #[error("song {requested} is not the current playback (playing {current})")]
    SongNotPlaying { requested: SongId, current: SongId },
}

struct ActiveContext {
    user: UserId,
    expires_at: DateTime<Utc>,
}

struct SessionState {
    library: Library,
    // keyed by the id of the token that opened the context
    active: HashMap<Uuid, ActiveContext>,
    playbacks: HashMap<UserId, Playback>,
}

impl SessionState {
    fn is_active_at(&self, user: UserId, now: DateTime<Utc>) -> bool {
        self.active
            .values()
            .any(|ctx| ctx.user == user && ctx.expires_at > now)
    }
}

pub struct StreamingSession {
    state: RwLock<SessionState>,
}

impl StreamingSession {
    pub fn new(library: Library) -> StreamingSession {
        StreamingSession {
            state: RwLock::new(SessionState {
                library,
                active: HashMap::new(),
                playbacks: HashMap::new(),
            }),
        }
    }

    pub fn add_song(&self, song: Song) -> Result<(), SessionError> {
        song.validate_size()?;
        let id = song.id();
        let mut state = self.state.write();
        state.library.add_song(song).map_err(|e| {
            warn!(song_id = %id, error = %e, "library rejected song");
            e
        })?;
        info!(song_id = %id, total = state.library.len(), "song added to library");
        Ok(())
    }

    pub fn remove_song(&self, id: SongId) -> Result<Song, SessionError> {
        let mut state = self.state.write();
        let song = state.library.remove_song(id)?;
        info!(song_id = %id, total = state.library.len(), "song removed from library");
        Ok(song)
    }

    /// Read-only snapshot of the library contents.
    pub fn library(&self) -> Vec<Song> {
        self.state.read().library.songs().to_vec()
    }

    pub fn get_song(&self, id: SongId) -> Result<Song, SessionError> {
        Ok(self.state.read().library.get_song_by_id(id)?)
    }

    pub fn search(&self, query: &str) -> Vec<Song> {
        self.state.read().library.search_songs(query)
    }

    pub fn songs_by_genre(&self, genre: &str) -> Vec<Song> {
        self.state.read().library.get_songs_by_genre(genre)
    }

    pub fn stats(&self) -> LibraryStats {
        self.state.read().library.get_library_stats()
    }

    pub fn last_updated(&self) -> String {
        self.state.read().library.format_last_updated()
    }

    pub fn available_space_mb(&self) -> f64 {
        self.state.read().library.get_available_space_mb()
    }

    pub fn validate_limits(&self) -> Result<(), SessionError> {
        Ok(self.state.read().library.validate_limits()?)
    }

    pub fn add_favorite(&self, user: UserId, song: SongId) -> Result<(), SessionError> {
        self.state.write().library.add_favorite(user, song)?;
        debug!(user_id = %user, song_id = %song, "favorite added");
        Ok(())
    }

    pub fn remove_favorite(&self, user: UserId, song: SongId) -> Result<(), SessionError> {
        self.state.write().library.remove_favorite(user, song)?;
        debug!(user_id = %user, song_id = %song, "favorite removed");
        Ok(())
    }

    pub fn favorites(&self, user: UserId) -> Vec<Song> {
        let state = self.state.read();
        state
            .library
            .favorites(user)
            .into_iter()
            .filter_map(|id| state.library.get_song_by_id(id).ok())
            .collect()
    }

    pub fn is_favorite(&self, user: UserId, song: SongId) -> bool {
        self.state.read().library.is_favorite(user, song)
    }

    /// Opens (or refreshes) the user context tied to one login token.
    /// Expired contexts are dropped on the way.
    pub fn activate_user(&self, user: UserId, context: Uuid, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.active.retain(|_, ctx| ctx.expires_at > now);
        let fresh = state
            .active
            .insert(context, ActiveContext { user, expires_at })
            .is_none();
        if fresh {
            debug!(user_id = %user, %context, "user context opened");
        }
    }

    /// Closes one login context. Once the user has no context left, an
    /// unfinished playback is completed and dropped.
    pub fn deactivate_user(&self, context: Uuid) {
        let now = Utc::now();
        let mut state = self.state.write();
        let user = match state.active.remove(&context) {
            Some(ctx) => ctx.user,
            None => return,
        };
        if !state.is_active_at(user, now) {
            if let Some(mut playback) = state.playbacks.remove(&user) {
                playback.complete_at(now);
            }
        }
        debug!(user_id = %user, %context, "user context closed");
    }

    pub fn is_active(&self, user: UserId) -> bool {
        self.state.read().is_active_at(user, Utc::now())
    }

    /// Drops everything the session holds for a deleted account.
    pub fn forget_user(&self, user: UserId) {
        let mut state = self.state.write();
        state.active.retain(|_, ctx| ctx.user != user);
        state.playbacks.remove(&user);
        state.library.clear_favorites(user);
        info!(user_id = %user, "user forgotten");
    }

    /// Starts tracking a new playback for `user`. Any previous playback of
    /// that user is completed first.
    pub fn play_song(&self, user: UserId, id: SongId) -> Result<Playback, SessionError> {
        let now = Utc::now();
        let mut state = self.state.write();
        if !state.is_active_at(user, now) {
            return Err(SessionError::NoActiveUser);
        }
        state.library.record_play(id, now)?;

        if let Some(previous) = state.playbacks.get_mut(&user) {
            previous.complete_at(now);
        }
        let mut playback = Playback::new_at(user, id, now);
        playback.start_at(now)?;
        state.playbacks.insert(user, playback.clone());
        info!(user_id = %user, song_id = %id, "playback started");
        Ok(playback)
    }

    pub fn pause_song(&self, user: UserId, id: SongId) -> Result<Playback, SessionError> {
        self.with_playback(user, id, |p| p.pause())
    }

    pub fn resume_song(&self, user: UserId, id: SongId) -> Result<Playback, SessionError> {
        self.with_playback(user, id, |p| p.start())
    }

    pub fn complete_song(&self, user: UserId, id: SongId) -> Result<Playback, SessionError> {
        self.with_playback(user, id, |p| {
            p.complete();
            Ok(())
        })
    }

    pub fn current_playback(&self, user: UserId) -> Option<Playback> {
        self.state.read().playbacks.get(&user).cloned()
    }

    fn with_playback<F>(&self, user: UserId, id: SongId, op: F) -> Result<Playback, SessionError>
    where
        F: FnOnce(&mut Playback) -> Result<(), PlaybackError>,
    {
        let mut state = self.state.write();
        let playback = state
            .playbacks
            .get_mut(&user)
            .ok_or(SessionError::NoActivePlayback)?;
        if playback.song_id() != id {
            return Err(SessionError::SongNotPlaying {
                requested: id,
                current: playback.song_id(),
            });
        }
        op(playback)?;
        debug!(user_id = %user, song_id = %id, status = playback.status_label(), "playback updated");
        Ok(playback.clone())
    }
}
