use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::song::SongId;
use super::user::UserId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Completed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback was already completed")]
    AlreadyCompleted,

    #[error("playback is not in progress")]
    NotPlaying,
}

/// One listening session of a user on a song.
///
/// `duration` only accumulates time spent in the `Playing` state: each
/// pause (or completion) folds the time since the last (re)start into it.
#[derive(Debug, Clone)]
pub struct Playback {
    user_id: UserId,
    song_id: SongId,
    played_at: DateTime<Utc>,
    resumed_at: DateTime<Utc>,
    paused_at: Option<DateTime<Utc>>,
    duration: Duration,
    status: PlaybackStatus,
}

impl Playback {
    pub fn new(user_id: UserId, song_id: SongId) -> Playback {
        Playback::new_at(user_id, song_id, Utc::now())
    }

    pub fn new_at(user_id: UserId, song_id: SongId, now: DateTime<Utc>) -> Playback {
        Playback {
            user_id,
            song_id,
            played_at: now,
            resumed_at: now,
            paused_at: None,
            duration: Duration::zero(),
            status: PlaybackStatus::Playing,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn song_id(&self) -> SongId {
        self.song_id
    }

    pub fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == PlaybackStatus::Completed
    }

    pub fn start(&mut self) -> Result<(), PlaybackError> {
        self.start_at(Utc::now())
    }

    pub fn start_at(&mut self, now: DateTime<Utc>) -> Result<(), PlaybackError> {
        if self.is_completed() {
            return Err(PlaybackError::AlreadyCompleted);
        }
        if self.status == PlaybackStatus::Paused {
            self.resumed_at = now;
            self.paused_at = None;
        }
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.pause_at(Utc::now())
    }

    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<(), PlaybackError> {
        if self.is_completed() {
            return Err(PlaybackError::AlreadyCompleted);
        }
        if self.status != PlaybackStatus::Playing {
            return Err(PlaybackError::NotPlaying);
        }
        self.duration = self.duration + elapsed(self.resumed_at, now);
        self.paused_at = Some(now);
        self.status = PlaybackStatus::Paused;
        Ok(())
    }

    pub fn complete(&mut self) {
        self.complete_at(Utc::now())
    }

    /// Terminal; calling it on a completed playback changes nothing.
    pub fn complete_at(&mut self, now: DateTime<Utc>) {
        if self.status == PlaybackStatus::Playing {
            self.duration = self.duration + elapsed(self.resumed_at, now);
        }
        self.paused_at = None;
        self.status = PlaybackStatus::Completed;
    }

    pub fn current_duration(&self) -> Duration {
        self.current_duration_at(Utc::now())
    }

    pub fn current_duration_at(&self, now: DateTime<Utc>) -> Duration {
        match self.status {
            PlaybackStatus::Playing => self.duration + elapsed(self.resumed_at, now),
            PlaybackStatus::Paused | PlaybackStatus::Completed => self.duration,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self.status {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Completed => "Completed",
        }
    }

    /// `m:ss`
    pub fn formatted_duration(&self) -> String {
        format_duration(self.current_duration())
    }

    pub fn format_played_at(&self) -> String {
        self.played_at.format("%d-%m-%Y %H:%M:%S").to_string()
    }

    pub fn is_recent(&self) -> bool {
        self.is_recent_at(Utc::now())
    }

    pub fn is_recent_at(&self, now: DateTime<Utc>) -> bool {
        elapsed(self.played_at, now) < Duration::hours(24)
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    std::cmp::max(now - since, Duration::zero())
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn playback() -> Playback {
        Playback::new_at(UserId(1), SongId(2), t(0))
    }

    #[test]
    fn starts_out_playing() {
        let p = playback();
        assert_eq!(p.status(), PlaybackStatus::Playing);
        assert_eq!(p.played_at(), t(0));
        assert!(!p.is_completed());
    }

    #[test]
    fn pause_twice_is_rejected() {
        let mut p = playback();
        p.pause_at(t(5)).unwrap();
        assert_eq!(p.status(), PlaybackStatus::Paused);
        assert_eq!(p.paused_at(), Some(t(5)));
        assert_eq!(p.pause_at(t(6)), Err(PlaybackError::NotPlaying));
    }

    #[test]
    fn start_is_idempotent_while_playing() {
        let mut p = playback();
        p.start_at(t(3)).unwrap();
        p.start_at(t(4)).unwrap();
        assert_eq!(p.current_duration_at(t(10)), Duration::seconds(10));
    }

    #[test]
    fn completed_is_terminal() {
        let mut p = playback();
        p.complete_at(t(30));
        assert_eq!(p.status(), PlaybackStatus::Completed);
        assert_eq!(p.start_at(t(31)), Err(PlaybackError::AlreadyCompleted));
        assert_eq!(p.pause_at(t(31)), Err(PlaybackError::AlreadyCompleted));

        p.complete_at(t(60));
        assert_eq!(p.current_duration_at(t(90)), Duration::seconds(30));
    }

    #[test]
    fn duration_counts_listening_time_only() {
        let mut p = playback();
        p.pause_at(t(10)).unwrap();
        // frozen while paused
        assert_eq!(p.current_duration_at(t(100)), Duration::seconds(10));

        p.start_at(t(100)).unwrap();
        assert_eq!(p.current_duration_at(t(105)), Duration::seconds(15));

        p.complete_at(t(120));
        assert_eq!(p.current_duration_at(t(500)), Duration::seconds(30));
    }

    #[test]
    fn completing_while_paused_keeps_accumulated_time() {
        let mut p = playback();
        p.pause_at(t(42)).unwrap();
        p.complete_at(t(1000));
        assert_eq!(p.current_duration_at(t(2000)), Duration::seconds(42));
        assert_eq!(p.paused_at(), None);
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_duration(Duration::seconds(75)), "1:15");
        assert_eq!(format_duration(Duration::seconds(9)), "0:09");

        let p = playback();
        assert_eq!(p.status_label(), "Playing");
        assert_eq!(p.format_played_at(), "14-11-2023 22:13:20");
        assert!(p.is_recent_at(t(3600)));
        assert!(!p.is_recent_at(t(25 * 3600)));
    }
}
