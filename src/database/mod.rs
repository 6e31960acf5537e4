use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::model::{Role, Song, SongError, SongId, User, UserId};

pub mod drivers;

use self::drivers::DbConnector;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("error parsing url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unknown scheme: {0}")]
    UnknownScheme(String),

    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("fixture error: {0}")]
    Fixture(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database worker failed: {0}")]
    Worker(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub file_size: u64,
    pub file_path: Option<String>,
}

impl SongRecord {
    pub fn to_song(&self) -> Result<Song, SongError> {
        Song::new(self.id, &self.title, &self.artist, &self.genre, self.file_size)
    }
}

#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub file_size: u64,
    pub file_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl UserRecord {
    pub fn profile(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Already hashed.
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Default, Clone)]
pub struct SongQuery {
    pub genre: Option<String>,
    /// Most recently added first; insertion order otherwise.
    pub newest_first: bool,
    pub limit: Option<usize>,
}

type Shared = Arc<Mutex<Box<dyn DbConnector>>>;

/// Handle to the relational store, built once at startup.
///
/// Reads go to `read_url` when one is configured, everything else to the
/// write connection. Store calls block, so async callers go through
/// [`Database::read`] / [`Database::write`] which hop onto the blocking
/// pool.
#[derive(Clone)]
pub struct Database {
    reader: Shared,
    writer: Shared,
}

impl Database {
    pub fn open(config: &DatabaseConfig) -> Result<Database, StoreError> {
        let mut writer = drivers::get_driver(config.write_url())?;
        writer.ensure_schema()?;
        let writer: Shared = Arc::new(Mutex::new(writer));

        let reader = if config.read_url() != config.write_url() {
            info!("using a dedicated read connection");
            Arc::new(Mutex::new(drivers::get_driver(config.read_url())?))
        } else {
            Arc::clone(&writer)
        };
        Ok(Database { reader, writer })
    }

    pub fn from_connector(conn: Box<dyn DbConnector>) -> Database {
        let shared: Shared = Arc::new(Mutex::new(conn));
        Database {
            reader: Arc::clone(&shared),
            writer: shared,
        }
    }

    pub fn read_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn DbConnector) -> Result<T, StoreError>,
    {
        let mut conn = self.reader.lock();
        op(conn.as_mut())
    }

    pub fn write_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn DbConnector) -> Result<T, StoreError>,
    {
        let mut conn = self.writer.lock();
        op(conn.as_mut())
    }

    pub async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DbConnector) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.clone();
        rocket::tokio::task::spawn_blocking(move || db.read_blocking(op))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    pub async fn write<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DbConnector) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.clone();
        rocket::tokio::task::spawn_blocking(move || db.write_blocking(op))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}
