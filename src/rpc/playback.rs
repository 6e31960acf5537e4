use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{self, PlaybackStatus, SongId, UserId};

#[derive(Serialize, Debug)]
pub struct PlaybackResponse {
    pub user_id: UserId,
    pub song_id: SongId,
    pub status: PlaybackStatus,
    pub label: &'static str,
    pub played_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    pub formatted_duration: String,
    pub completed: bool,
}

impl From<model::Playback> for PlaybackResponse {
    fn from(p: model::Playback) -> PlaybackResponse {
        let duration = p.current_duration();
        PlaybackResponse {
            user_id: p.user_id(),
            song_id: p.song_id(),
            status: p.status(),
            label: p.status_label(),
            played_at: p.played_at(),
            paused_at: p.paused_at(),
            duration_secs: duration.num_seconds(),
            formatted_duration: model::format_duration(duration),
            completed: p.is_completed(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct FavoriteRequest {
    #[serde(rename = "songId", alias = "song_id")]
    pub song_id: SongId,
}
