use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for a single song file, in bytes.
pub const MAX_SONG_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
#[serde(transparent)]
pub struct SongId(pub i64);

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SongError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("file size of {size} bytes exceeds the {limit} byte limit", limit = MAX_SONG_SIZE)]
    SizeExceeded { size: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    id: SongId,
    title: String,
    artist: String,
    genre: String,
    file_size: u64,
    added_at: DateTime<Utc>,
    play_count: u32,
    last_played: Option<DateTime<Utc>>,
}

fn require(field: &'static str, value: &str) -> Result<(), SongError> {
    if value.trim().is_empty() {
        return Err(SongError::MissingField(field));
    }
    Ok(())
}

impl Song {
    pub fn new(
        id: SongId,
        title: &str,
        artist: &str,
        genre: &str,
        file_size: u64,
    ) -> Result<Song, SongError> {
        require("title", title)?;
        require("artist", artist)?;
        require("genre", genre)?;

        let song = Song {
            id,
            title: title.to_owned(),
            artist: artist.to_owned(),
            genre: genre.to_owned(),
            file_size,
            added_at: Utc::now(),
            play_count: 0,
            last_played: None,
        };
        song.validate_size()?;
        Ok(song)
    }

    pub fn id(&self) -> SongId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        self.last_played
    }

    pub fn validate_size(&self) -> Result<(), SongError> {
        if self.file_size > MAX_SONG_SIZE {
            return Err(SongError::SizeExceeded { size: self.file_size });
        }
        Ok(())
    }

    /// Case-insensitive substring match against title, artist or genre.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.artist.to_lowercase().contains(&query)
            || self.genre.to_lowercase().contains(&query)
    }

    pub fn increment_play_count(&mut self) {
        self.increment_play_count_at(Utc::now());
    }

    pub(crate) fn increment_play_count_at(&mut self, now: DateTime<Utc>) {
        self.play_count += 1;
        self.last_played = Some(now);
    }

    /// Empty arguments leave the corresponding field untouched. The genre is
    /// not editable here since the library indexes songs by it.
    pub fn update_metadata(&mut self, title: &str, artist: &str) {
        if !title.trim().is_empty() {
            self.title = title.to_owned();
        }
        if !artist.trim().is_empty() {
            self.artist = artist.to_owned();
        }
    }

    pub fn formatted_file_size(&self) -> String {
        format_size(self.file_size)
    }

    pub fn info(&self) -> String {
        format!(
            "ID: {}\nTitle: {}\nArtist: {}\nGenre: {}\nSize: {}\nPlays: {}",
            self.id,
            self.title,
            self.artist,
            self.genre,
            self.formatted_file_size(),
            self.play_count,
        )
    }
}

/// Binary (1024-based) unit scaling with one decimal place.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: &[u8] = b"KMGTPE";

    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp] as char)
}

#[cfg(test)]
impl Song {
    /// Skips validation so limits enforced elsewhere can be exercised.
    pub(crate) fn with_file_size(mut self, file_size: u64) -> Song {
        self.file_size = file_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, artist: &str, genre: &str) -> Song {
        Song::new(SongId(1), title, artist, genre, 1024).unwrap()
    }

    #[test]
    fn rejects_empty_fields() {
        assert_eq!(
            Song::new(SongId(1), "", "Queen", "Rock", 10).unwrap_err(),
            SongError::MissingField("title")
        );
        assert_eq!(
            Song::new(SongId(1), "Song", "  ", "Rock", 10).unwrap_err(),
            SongError::MissingField("artist")
        );
        assert_eq!(
            Song::new(SongId(1), "Song", "Queen", "", 10).unwrap_err(),
            SongError::MissingField("genre")
        );
    }

    #[test]
    fn rejects_oversized_file() {
        let err = Song::new(SongId(1), "Big", "Band", "Rock", MAX_SONG_SIZE + 1).unwrap_err();
        assert_eq!(err, SongError::SizeExceeded { size: MAX_SONG_SIZE + 1 });
        assert!(Song::new(SongId(1), "Max", "Band", "Rock", MAX_SONG_SIZE).is_ok());
    }

    #[test]
    fn search_matches_any_field_ignoring_case() {
        let s = song("Bohemian Rhapsody", "Queen", "Rock");
        assert!(s.matches_search("rhapsody"));
        assert!(s.matches_search("QUEEN"));
        assert!(s.matches_search("roc"));
        assert!(!s.matches_search("pop"));
        assert!(s.matches_search(""));
    }

    #[test]
    fn play_count_is_monotonic() {
        let mut s = song("Memories", "Maroon 5", "Pop");
        assert_eq!(s.play_count(), 0);
        assert!(s.last_played().is_none());
        s.increment_play_count();
        s.increment_play_count();
        assert_eq!(s.play_count(), 2);
        assert!(s.last_played().is_some());
    }

    #[test]
    fn update_metadata_skips_blank_values() {
        let mut s = song("Memories", "Maroon 5", "Pop");
        s.update_metadata("", "Adam Levine");
        assert_eq!(s.title(), "Memories");
        assert_eq!(s.artist(), "Adam Levine");
    }

    #[test]
    fn formats_sizes_in_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn info_includes_formatted_size() {
        let s = Song::new(SongId(7), "Thunderstruck", "AC/DC", "Rock", 5 * 1024 * 1024).unwrap();
        let info = s.info();
        assert!(info.starts_with("ID: 7\n"));
        assert!(info.contains("Size: 5.0 MB"));
        assert!(info.ends_with("Plays: 0"));
    }
}
