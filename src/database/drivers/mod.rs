use std::collections::BTreeMap;

use url::Url;
use tracing::debug;

pub mod mock;
pub mod postgres;

use super::{
    NewSong,
    NewUser,
    SongQuery,
    SongRecord,
    StoreError,
    UserRecord,
};
use crate::model::{Role, SongId, UserId};

pub trait DbConnector: Send {
    /// Creates missing tables. Only run against the write connection.
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn get_songs(&mut self, query: &SongQuery) -> Result<Vec<SongRecord>, StoreError>;

    fn insert_song(&mut self, song: &NewSong) -> Result<SongRecord, StoreError>;

    /// Returns whether a row was deleted.
    fn delete_song(&mut self, id: SongId) -> Result<bool, StoreError>;

    fn create_user(&mut self, user: &NewUser) -> Result<UserRecord, StoreError>;

    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>, StoreError>;

    fn list_users(&mut self) -> Result<Vec<UserRecord>, StoreError>;

    /// Returns the updated user, or `None` when no such user exists.
    fn update_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserRecord>, StoreError>;

    /// Removes the user together with their favorites.
    fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError>;

    fn add_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError>;

    fn remove_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError>;

    fn get_favorites(&mut self, user: UserId) -> Result<Vec<SongRecord>, StoreError>;

    /// Every (user, song) favorite pair, used to restore the library.
    fn get_all_favorites(&mut self) -> Result<Vec<(UserId, SongId)>, StoreError>;

    /// Newest songs of each genre, at most `per_genre` of them. Genres
    /// without songs map to an empty list.
    fn get_recommendations(
        &mut self,
        genres: &[String],
        per_genre: usize,
    ) -> Result<BTreeMap<String, Vec<SongRecord>>, StoreError> {
        let mut out = BTreeMap::new();
        for genre in genres {
            let songs = self.get_songs(&SongQuery {
                genre: Some(genre.clone()),
                newest_first: true,
                limit: Some(per_genre),
            })?;
            out.insert(genre.clone(), songs);
        }
        Ok(out)
    }
}

pub fn get_driver(url_raw: &str) -> Result<Box<dyn DbConnector>, StoreError> {
    let url = Url::parse(url_raw)?;

    debug!(scheme = url.scheme(), "getting driver");
    match url.scheme() {
        postgres::DRIVER_NAME | "postgres" => Ok(Box::new(postgres::PostgresConnector::connect(url_raw)?)),
        mock::DRIVER_NAME => Ok(Box::new(mock::MockConnector::open(&url)?)),
        scheme => Err(StoreError::UnknownScheme(scheme.to_owned())),
    }
}
