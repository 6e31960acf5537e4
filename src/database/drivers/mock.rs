use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::DbConnector;
use crate::database::{
    NewSong,
    NewUser,
    SongQuery,
    SongRecord,
    StoreError,
    UserRecord,
};
use crate::model::{Role, SongId, UserId};

pub const DRIVER_NAME: &str = "mock";

/// `mock://memory` starts empty; any other `mock:` url names a directory
/// holding a `database.json` fixture file.
#[derive(Debug, Default, Deserialize)]
struct Fixtures {
    #[serde(default)]
    songs: Vec<SongRecord>,
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    favorites: Vec<(UserId, SongId)>,
}

#[derive(Debug, Default)]
pub struct MockConnector {
    songs: Vec<SongRecord>,
    users: Vec<UserRecord>,
    favorites: BTreeSet<(UserId, SongId)>,
    next_song_id: i64,
    next_user_id: i64,
}

impl MockConnector {
    pub fn open(url: &Url) -> Result<MockConnector, StoreError> {
        if url.host_str() == Some("memory") {
            return Ok(MockConnector::new());
        }

        let database_path = PathBuf::from(url.path()).join("database.json");
        debug!(path = %database_path.display(), "loading fixtures");
        let db_json = File::open(&database_path)?;
        let fixtures: Fixtures = serde_json::from_reader(db_json)?;
        Ok(MockConnector::from_fixtures(fixtures))
    }

    pub fn new() -> MockConnector {
        MockConnector::from_fixtures(Fixtures::default())
    }

    fn from_fixtures(fixtures: Fixtures) -> MockConnector {
        let next_song_id = fixtures.songs.iter().map(|s| s.id.0).max().unwrap_or(0) + 1;
        let next_user_id = fixtures.users.iter().map(|u| u.id.0).max().unwrap_or(0) + 1;
        MockConnector {
            songs: fixtures.songs,
            users: fixtures.users,
            favorites: fixtures.favorites.into_iter().collect(),
            next_song_id,
            next_user_id,
        }
    }
}

impl DbConnector for MockConnector {
    fn get_songs(&mut self, query: &SongQuery) -> Result<Vec<SongRecord>, StoreError> {
        let matching = self
            .songs
            .iter()
            .filter(|s| query.genre.as_ref().map_or(true, |g| *g == s.genre));
        let limit = query.limit.unwrap_or(usize::MAX);
        let songs = if query.newest_first {
            matching.rev().take(limit).cloned().collect()
        } else {
            matching.take(limit).cloned().collect()
        };
        Ok(songs)
    }

    fn insert_song(&mut self, song: &NewSong) -> Result<SongRecord, StoreError> {
        let record = SongRecord {
            id: SongId(self.next_song_id),
            title: song.title.clone(),
            artist: song.artist.clone(),
            genre: song.genre.clone(),
            file_size: song.file_size,
            file_path: song.file_path.clone(),
        };
        self.next_song_id += 1;
        self.songs.push(record.clone());
        Ok(record)
    }

    fn delete_song(&mut self, id: SongId) -> Result<bool, StoreError> {
        let before = self.songs.len();
        self.songs.retain(|s| s.id != id);
        self.favorites.retain(|(_, song)| *song != id);
        Ok(self.songs.len() != before)
    }

    fn create_user(&mut self, user: &NewUser) -> Result<UserRecord, StoreError> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken(user.email.clone()));
        }
        let record = UserRecord {
            id: UserId(self.next_user_id),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            role: user.role,
        };
        self.next_user_id += 1;
        self.users.push(record.clone());
        Ok(record)
    }

    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.iter().find(|u| u.email == email).cloned())
    }

    fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    fn list_users(&mut self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.users.clone())
    }

    fn update_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError> {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        self.favorites.retain(|(user, _)| *user != id);
        Ok(self.users.len() != before)
    }

    fn add_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError> {
        self.favorites.insert((user, song));
        Ok(())
    }

    fn remove_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError> {
        self.favorites.remove(&(user, song));
        Ok(())
    }

    fn get_favorites(&mut self, user: UserId) -> Result<Vec<SongRecord>, StoreError> {
        let songs = &self.songs;
        Ok(self
            .favorites
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, id)| songs.iter().find(|s| s.id == *id).cloned())
            .collect())
    }

    fn get_all_favorites(&mut self) -> Result<Vec<(UserId, SongId)>, StoreError> {
        Ok(self.favorites.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn new_song(title: &str, genre: &str) -> NewSong {
        NewSong {
            title: title.to_owned(),
            artist: "Artist".to_owned(),
            genre: genre.to_owned(),
            file_size: 1024,
            file_path: None,
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Juan Perez".to_owned(),
            email: email.to_owned(),
            password: "hash".to_owned(),
            role: Role::User,
        }
    }

    #[test]
    fn assigns_increasing_ids() {
        let mut conn = MockConnector::new();
        let a = conn.insert_song(&new_song("A", "Rock")).unwrap();
        let b = conn.insert_song(&new_song("B", "Pop")).unwrap();
        assert_eq!(a.id, SongId(1));
        assert_eq!(b.id, SongId(2));

        let rock = conn
            .get_songs(&SongQuery {
                genre: Some("Rock".to_owned()),
                ..SongQuery::default()
            })
            .unwrap();
        assert_eq!(rock, vec![a]);
    }

    #[test]
    fn recommends_newest_songs_per_genre() {
        let mut conn = MockConnector::new();
        for (title, genre) in [("A", "Rock"), ("B", "Pop"), ("C", "Rock"), ("D", "Rock")] {
            conn.insert_song(&new_song(title, genre)).unwrap();
        }

        let recs = conn
            .get_recommendations(&["Rock".to_owned(), "Jazz".to_owned()], 2)
            .unwrap();
        let rock: Vec<&str> = recs["Rock"].iter().map(|s| s.title.as_str()).collect();
        assert_eq!(rock, ["D", "C"]);
        assert!(recs["Jazz"].is_empty());
        assert!(!recs.contains_key("Pop"));
    }

    #[test]
    fn manages_user_roles() {
        let mut conn = MockConnector::new();
        let ana = conn.create_user(&new_user("ana@example.com")).unwrap();
        let song = conn.insert_song(&new_song("A", "Rock")).unwrap();
        conn.add_favorite(ana.id, song.id).unwrap();

        let promoted = conn.update_user_role(ana.id, Role::Admin).unwrap().unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(conn.get_user(ana.id).unwrap().unwrap().role, Role::Admin);
        assert!(conn.update_user_role(UserId(99), Role::Admin).unwrap().is_none());

        assert!(conn.delete_user(ana.id).unwrap());
        assert!(conn.list_users().unwrap().is_empty());
        assert!(conn.get_all_favorites().unwrap().is_empty());
        assert!(!conn.delete_user(ana.id).unwrap());
    }

    #[test]
    fn rejects_duplicate_emails() {
        let mut conn = MockConnector::new();
        conn.create_user(&new_user("juan@example.com")).unwrap();
        match conn.create_user(&new_user("juan@example.com")) {
            Err(StoreError::EmailTaken(email)) => assert_eq!(email, "juan@example.com"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn deleting_a_song_drops_its_favorites() {
        let mut conn = MockConnector::new();
        let user = conn.create_user(&new_user("ana@example.com")).unwrap();
        let song = conn.insert_song(&new_song("A", "Rock")).unwrap();
        conn.add_favorite(user.id, song.id).unwrap();
        conn.add_favorite(user.id, song.id).unwrap();
        assert_eq!(conn.get_favorites(user.id).unwrap().len(), 1);

        assert!(conn.delete_song(song.id).unwrap());
        assert!(conn.get_favorites(user.id).unwrap().is_empty());
        assert!(!conn.delete_song(song.id).unwrap());
    }

    #[test]
    fn loads_fixture_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("database.json")).unwrap();
        write!(
            file,
            r#"{{"songs": [{{"id": 7, "title": "Thunderstruck", "artist": "AC/DC",
                "genre": "Rock", "file_size": 5242880, "file_path": null}}]}}"#
        )
        .unwrap();

        let url = Url::from_directory_path(dir.path()).unwrap();
        let url = Url::parse(&url.as_str().replacen("file:", "mock:", 1)).unwrap();
        let mut conn = MockConnector::open(&url).unwrap();
        let songs = conn.get_songs(&SongQuery::default()).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, SongId(7));
        assert_eq!(songs[0].title, "Thunderstruck");
        assert_eq!(conn.insert_song(&new_song("Next", "Rock")).unwrap().id, SongId(8));
    }
}
