use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::song::{Song, SongError, SongId, MAX_SONG_SIZE};
use super::user::UserId;

pub const MAX_SONGS: usize = 60;
pub const MAX_LIBRARY_SIZE: u64 = MAX_SONGS as u64 * MAX_SONG_SIZE;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("song limit reached (at most {max} songs)", max = MAX_SONGS)]
    CapacityExceeded,

    #[error("song {0} is already in the library")]
    DuplicateId(SongId),

    #[error("adding {size} bytes would exceed the library size limit")]
    SizeLimitExceeded { size: u64 },

    #[error("song {0} not found")]
    NotFound(SongId),

    #[error("song {0} is not in the library")]
    SongNotInLibrary(SongId),

    #[error("library exceeds its {0} limit")]
    LimitExceeded(&'static str),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LibraryStats {
    pub total_songs: usize,
    pub total_size_mb: f64,
    pub available_slots: usize,
    pub songs_per_genre: BTreeMap<String, usize>,
}

/// In-memory song collection of one user context.
///
/// The genre index and the running byte total are derived from `songs` and
/// only ever change together with it.
#[derive(Debug, Clone)]
pub struct Library {
    owner: UserId,
    songs: Vec<Song>,
    songs_by_genre: HashMap<String, Vec<SongId>>,
    favorites: HashMap<UserId, BTreeSet<SongId>>,
    total_size: u64,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl Library {
    pub fn new(owner: UserId) -> Library {
        let now = Utc::now();
        Library {
            owner,
            songs: Vec::new(),
            songs_by_genre: HashMap::new(),
            favorites: HashMap::new(),
            total_size: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn add_song(&mut self, song: Song) -> Result<(), LibraryError> {
        if let Err(SongError::SizeExceeded { size }) = song.validate_size() {
            return Err(LibraryError::SizeLimitExceeded { size });
        }
        if self.songs.len() >= MAX_SONGS {
            return Err(LibraryError::CapacityExceeded);
        }
        if self.position(song.id()).is_some() {
            return Err(LibraryError::DuplicateId(song.id()));
        }
        if self.total_size + song.file_size() > MAX_LIBRARY_SIZE {
            return Err(LibraryError::SizeLimitExceeded { size: song.file_size() });
        }

        self.songs_by_genre
            .entry(song.genre().to_owned())
            .or_default()
            .push(song.id());
        self.total_size += song.file_size();
        self.songs.push(song);
        self.touch();
        Ok(())
    }

    /// Removes the song and purges it from every user's favorites.
    pub fn remove_song(&mut self, id: SongId) -> Result<Song, LibraryError> {
        let idx = self.position(id).ok_or(LibraryError::NotFound(id))?;
        let song = self.songs.remove(idx);

        if let Some(bucket) = self.songs_by_genre.get_mut(song.genre()) {
            if let Some(pos) = bucket.iter().position(|s| *s == id) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.songs_by_genre.remove(song.genre());
            }
        }
        self.favorites.retain(|_, favs| {
            favs.remove(&id);
            !favs.is_empty()
        });

        self.total_size -= song.file_size();
        self.touch();
        Ok(song)
    }

    pub fn get_song_by_id(&self, id: SongId) -> Result<Song, LibraryError> {
        self.songs
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or(LibraryError::NotFound(id))
    }

    /// Every song matching `query`, in insertion order. A blank query
    /// matches everything.
    pub fn search_songs(&self, query: &str) -> Vec<Song> {
        let query = query.trim();
        self.songs
            .iter()
            .filter(|s| s.matches_search(query))
            .cloned()
            .collect()
    }

    pub fn get_songs_by_genre(&self, genre: &str) -> Vec<Song> {
        let bucket = match self.songs_by_genre.get(genre) {
            Some(bucket) => bucket,
            None => return Vec::new(),
        };
        bucket
            .iter()
            .filter_map(|id| self.songs.iter().find(|s| s.id() == *id))
            .cloned()
            .collect()
    }

    pub fn genres(&self) -> Vec<String> {
        let mut genres: Vec<String> = self.songs_by_genre.keys().cloned().collect();
        genres.sort();
        genres
    }

    /// Bumps play statistics of the stored song and returns the updated copy.
    pub fn record_play(&mut self, id: SongId, now: DateTime<Utc>) -> Result<Song, LibraryError> {
        let idx = self.position(id).ok_or(LibraryError::NotFound(id))?;
        let song = &mut self.songs[idx];
        song.increment_play_count_at(now);
        Ok(song.clone())
    }

    /// Idempotent: a song is either a favorite of a user or it is not.
    pub fn add_favorite(&mut self, user: UserId, song: SongId) -> Result<(), LibraryError> {
        if self.position(song).is_none() {
            return Err(LibraryError::SongNotInLibrary(song));
        }
        self.favorites.entry(user).or_default().insert(song);
        self.touch();
        Ok(())
    }

    pub fn remove_favorite(&mut self, user: UserId, song: SongId) -> Result<(), LibraryError> {
        if self.position(song).is_none() {
            return Err(LibraryError::SongNotInLibrary(song));
        }
        if let Some(favs) = self.favorites.get_mut(&user) {
            favs.remove(&song);
            if favs.is_empty() {
                self.favorites.remove(&user);
            }
        }
        self.touch();
        Ok(())
    }

    pub fn favorites(&self, user: UserId) -> Vec<SongId> {
        self.favorites
            .get(&user)
            .map(|favs| favs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drops every favorite of `user`.
    pub fn clear_favorites(&mut self, user: UserId) {
        if self.favorites.remove(&user).is_some() {
            self.touch();
        }
    }

    pub fn is_favorite(&self, user: UserId, song: SongId) -> bool {
        self.favorites
            .get(&user)
            .map_or(false, |favs| favs.contains(&song))
    }

    pub fn get_library_stats(&self) -> LibraryStats {
        LibraryStats {
            total_songs: self.songs.len(),
            total_size_mb: self.total_size as f64 / MIB,
            available_slots: MAX_SONGS.saturating_sub(self.songs.len()),
            songs_per_genre: self
                .songs_by_genre
                .iter()
                .map(|(genre, bucket)| (genre.clone(), bucket.len()))
                .collect(),
        }
    }

    pub fn get_available_space_mb(&self) -> f64 {
        MAX_LIBRARY_SIZE.saturating_sub(self.total_size) as f64 / MIB
    }

    pub fn validate_limits(&self) -> Result<(), LibraryError> {
        if self.songs.len() > MAX_SONGS {
            return Err(LibraryError::LimitExceeded("song count"));
        }
        if self.total_size > MAX_LIBRARY_SIZE {
            return Err(LibraryError::LimitExceeded("size"));
        }
        Ok(())
    }

    /// `dd-mm-YYYY HH:MM:SS`
    pub fn format_last_updated(&self) -> String {
        self.last_updated.format("%d-%m-%Y %H:%M:%S").to_string()
    }

    fn position(&self, id: SongId) -> Option<usize> {
        self.songs.iter().position(|s| s.id() == id)
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn song(id: i64, title: &str, artist: &str, genre: &str, size: u64) -> Song {
        Song::new(SongId(id), title, artist, genre, size).unwrap()
    }

    fn sample() -> Library {
        let mut lib = Library::new(UserId(1));
        lib.add_song(song(1, "Thunderstruck", "AC/DC", "Rock", 5 * MB)).unwrap();
        lib.add_song(song(2, "Memories", "Maroon 5", "Pop", 4 * MB)).unwrap();
        lib.add_song(song(3, "Bohemian Rhapsody", "Queen", "Rock", 6 * MB)).unwrap();
        lib
    }

    fn assert_consistent(lib: &Library) {
        let sum: u64 = lib.songs().iter().map(|s| s.file_size()).sum();
        assert_eq!(lib.total_size(), sum);
        let indexed: usize = lib.get_library_stats().songs_per_genre.values().sum();
        assert_eq!(indexed, lib.len());
        for genre in lib.genres() {
            for s in lib.get_songs_by_genre(&genre) {
                assert_eq!(s.genre(), genre);
            }
        }
        lib.validate_limits().unwrap();
    }

    #[test]
    fn fills_up_to_capacity() {
        let mut lib = Library::new(UserId(1));
        for i in 0..MAX_SONGS as i64 {
            lib.add_song(song(i, "Track", "Artist", "Ambient", MB)).unwrap();
            assert_eq!(lib.len(), i as usize + 1);
        }
        assert_consistent(&lib);
        assert_eq!(lib.total_size(), MAX_SONGS as u64 * MB);
        assert_eq!(
            lib.add_song(song(1000, "One more", "Artist", "Ambient", 1)),
            Err(LibraryError::CapacityExceeded)
        );
        assert_eq!(lib.get_library_stats().available_slots, 0);
    }

    #[test]
    fn oversized_song_is_rejected_even_when_full() {
        let oversized = song(99, "Huge", "Band", "Rock", MB).with_file_size(MAX_SONG_SIZE + 1);

        let mut lib = Library::new(UserId(1));
        assert_eq!(
            lib.add_song(oversized.clone()),
            Err(LibraryError::SizeLimitExceeded { size: MAX_SONG_SIZE + 1 })
        );

        for i in 0..MAX_SONGS as i64 {
            lib.add_song(song(i, "Track", "Artist", "Rock", 1)).unwrap();
        }
        assert_eq!(
            lib.add_song(oversized),
            Err(LibraryError::SizeLimitExceeded { size: MAX_SONG_SIZE + 1 })
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut lib = sample();
        assert_eq!(
            lib.add_song(song(2, "Other", "Someone", "Jazz", MB)),
            Err(LibraryError::DuplicateId(SongId(2)))
        );
        assert_eq!(lib.len(), 3);
        assert!(lib.get_songs_by_genre("Jazz").is_empty());
    }

    #[test]
    fn remove_updates_index_and_size() {
        let mut lib = sample();
        let before = lib.total_size();
        let removed = lib.remove_song(SongId(1)).unwrap();
        assert_eq!(removed.title(), "Thunderstruck");
        assert_eq!(lib.total_size(), before - 5 * MB);
        assert_eq!(lib.get_song_by_id(SongId(1)), Err(LibraryError::NotFound(SongId(1))));
        let rock: Vec<_> = lib.get_songs_by_genre("Rock").iter().map(|s| s.id()).collect();
        assert_eq!(rock, vec![SongId(3)]);
        assert_eq!(lib.remove_song(SongId(1)), Err(LibraryError::NotFound(SongId(1))));
        assert_consistent(&lib);
    }

    #[test]
    fn removing_last_song_of_genre_drops_the_bucket() {
        let mut lib = sample();
        lib.remove_song(SongId(2)).unwrap();
        assert_eq!(lib.genres(), vec!["Rock".to_owned()]);
        assert!(!lib.get_library_stats().songs_per_genre.contains_key("Pop"));
    }

    #[test]
    fn search_keeps_insertion_order() {
        let lib = sample();
        let titles: Vec<_> = lib
            .search_songs("rock")
            .iter()
            .map(|s| s.title().to_owned())
            .collect();
        assert_eq!(titles, vec!["Thunderstruck", "Bohemian Rhapsody"]);
        assert!(lib.search_songs("jazz").is_empty());
        assert_eq!(lib.search_songs("   ").len(), 3);
    }

    #[test]
    fn unknown_genre_yields_empty_bucket() {
        assert!(sample().get_songs_by_genre("Metal").is_empty());
    }

    #[test]
    fn favorites_use_set_semantics() {
        let mut lib = sample();
        lib.add_favorite(UserId(1), SongId(2)).unwrap();
        lib.add_favorite(UserId(1), SongId(2)).unwrap();
        assert_eq!(lib.favorites(UserId(1)), vec![SongId(2)]);

        lib.remove_favorite(UserId(1), SongId(2)).unwrap();
        assert!(lib.favorites(UserId(1)).is_empty());
        assert!(!lib.is_favorite(UserId(1), SongId(2)));

        assert_eq!(
            lib.add_favorite(UserId(1), SongId(42)),
            Err(LibraryError::SongNotInLibrary(SongId(42)))
        );
        assert_eq!(
            lib.remove_favorite(UserId(1), SongId(42)),
            Err(LibraryError::SongNotInLibrary(SongId(42)))
        );
    }

    #[test]
    fn removing_a_song_purges_favorites() {
        let mut lib = sample();
        lib.add_favorite(UserId(1), SongId(3)).unwrap();
        lib.add_favorite(UserId(2), SongId(3)).unwrap();
        lib.add_favorite(UserId(2), SongId(1)).unwrap();
        lib.remove_song(SongId(3)).unwrap();
        assert!(lib.favorites(UserId(1)).is_empty());
        assert_eq!(lib.favorites(UserId(2)), vec![SongId(1)]);
    }

    #[test]
    fn stats_and_available_space() {
        let lib = sample();
        let stats = lib.get_library_stats();
        assert_eq!(stats.total_songs, 3);
        assert_eq!(stats.total_size_mb, 15.0);
        assert_eq!(stats.available_slots, MAX_SONGS - 3);
        assert_eq!(stats.songs_per_genre.get("Rock"), Some(&2));
        assert_eq!(stats.songs_per_genre.get("Pop"), Some(&1));
        assert_eq!(lib.get_available_space_mb(), 600.0 - 15.0);
    }

    #[test]
    fn aggregate_size_is_capped() {
        let mut lib = Library::new(UserId(1));
        for i in 0..(MAX_SONGS as i64 - 1) {
            lib.add_song(song(i, "Full", "Artist", "Noise", MAX_SONG_SIZE)).unwrap();
        }
        lib.add_song(song(100, "Last", "Artist", "Noise", MAX_SONG_SIZE)).unwrap();
        assert_eq!(lib.total_size(), MAX_LIBRARY_SIZE);
        assert_eq!(lib.get_available_space_mb(), 0.0);
        assert_consistent(&lib);
    }

    #[test]
    fn record_play_updates_stored_song() {
        let mut lib = sample();
        let now = Utc::now();
        let played = lib.record_play(SongId(3), now).unwrap();
        assert_eq!(played.play_count(), 1);
        assert_eq!(lib.get_song_by_id(SongId(3)).unwrap().last_played(), Some(now));
        assert_eq!(lib.get_songs_by_genre("Rock")[1].play_count(), 1);
    }
}
