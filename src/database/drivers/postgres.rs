use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use tracing::{debug, info};

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

pub const DRIVER_NAME: &str = "postgresql";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user'
    );
    CREATE TABLE IF NOT EXISTS songs (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        genre TEXT NOT NULL,
        file_size BIGINT NOT NULL,
        file_path TEXT
    );
    CREATE TABLE IF NOT EXISTS user_favorites (
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        song_id BIGINT NOT NULL REFERENCES songs (id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, song_id)
    );
";

const SONG_COLUMNS: &str = "s.id, s.title, s.artist, s.genre, s.file_size, s.file_path";

pub struct PostgresConnector {
    pgconn: Client,
}

impl PostgresConnector {
    pub fn connect(dburl: &str) -> Result<PostgresConnector, StoreError> {
        let pgconn = Client::connect(dburl, NoTls)?;
        info!("connected to postgres");
        Ok(PostgresConnector { pgconn })
    }
}

impl DbConnector for PostgresConnector {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.pgconn.batch_execute(SCHEMA)?;
        debug!("schema ready");
        Ok(())
    }

    fn get_songs(&mut self, query: &SongQuery) -> Result<Vec<SongRecord>, StoreError> {
        let limit = query.limit.map(size_to_sql).transpose()?;
        let mut sql = format!("SELECT {} FROM songs AS s", SONG_COLUMNS);
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref genre) = query.genre {
            params.push(genre);
            sql.push_str(" WHERE s.genre = $1");
        }
        sql.push_str(if query.newest_first { " ORDER BY s.id DESC" } else { " ORDER BY s.id" });
        if let Some(ref limit) = limit {
            params.push(limit);
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }

        let rows = self.pgconn.query(&sql, &params)?;
        rows.iter().map(song_from_row).collect()
    }

    fn insert_song(&mut self, song: &NewSong) -> Result<SongRecord, StoreError> {
        let size = size_to_sql(song.file_size)?;
        let row = self.pgconn.query_one("
            INSERT INTO songs (title, artist, genre, file_size, file_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ", &[&song.title, &song.artist, &song.genre, &size, &song.file_path])?;

        Ok(SongRecord {
            id: SongId(row.try_get(0)?),
            title: song.title.clone(),
            artist: song.artist.clone(),
            genre: song.genre.clone(),
            file_size: song.file_size,
            file_path: song.file_path.clone(),
        })
    }

    fn delete_song(&mut self, id: SongId) -> Result<bool, StoreError> {
        let deleted = self.pgconn.execute("DELETE FROM songs WHERE id = $1", &[&id.0])?;
        Ok(deleted > 0)
    }

    fn create_user(&mut self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let result = self.pgconn.query_one("
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ", &[&user.name, &user.email, &user.password, &user.role.as_str()]);

        let row = match result {
            Ok(row) => row,
            Err(ref e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                return Err(StoreError::EmailTaken(user.email.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(UserRecord {
            id: UserId(row.try_get(0)?),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            role: user.role,
        })
    }

    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = self.pgconn.query_opt(
            "SELECT id, name, email, password, role FROM users WHERE email = $1",
            &[&email],
        )?;
        row.as_ref().map(user_from_row).transpose()
    }

    fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = self.pgconn.query_opt(
            "SELECT id, name, email, password, role FROM users WHERE id = $1",
            &[&id.0],
        )?;
        row.as_ref().map(user_from_row).transpose()
    }

    fn list_users(&mut self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = self.pgconn.query(
            "SELECT id, name, email, password, role FROM users ORDER BY id",
            &[],
        )?;
        rows.iter().map(user_from_row).collect()
    }

    fn update_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserRecord>, StoreError> {
        let row = self.pgconn.query_opt("
            UPDATE users SET role = $1 WHERE id = $2
            RETURNING id, name, email, password, role
        ", &[&role.as_str(), &id.0])?;
        row.as_ref().map(user_from_row).transpose()
    }

    fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError> {
        let deleted = self.pgconn.execute("DELETE FROM users WHERE id = $1", &[&id.0])?;
        Ok(deleted > 0)
    }

    fn add_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError> {
        self.pgconn.execute("
            INSERT INTO user_favorites (user_id, song_id) VALUES ($1, $2)
            ON CONFLICT DO NOTHING
        ", &[&user.0, &song.0])?;
        Ok(())
    }

    fn remove_favorite(&mut self, user: UserId, song: SongId) -> Result<(), StoreError> {
        self.pgconn.execute(
            "DELETE FROM user_favorites WHERE user_id = $1 AND song_id = $2",
            &[&user.0, &song.0],
        )?;
        Ok(())
    }

    fn get_favorites(&mut self, user: UserId) -> Result<Vec<SongRecord>, StoreError> {
        let rows = self.pgconn.query(
            &format!("
                SELECT {} FROM songs AS s
                JOIN user_favorites AS f ON s.id = f.song_id
                WHERE f.user_id = $1
                ORDER BY s.id
            ", SONG_COLUMNS),
            &[&user.0],
        )?;
        rows.iter().map(song_from_row).collect()
    }

    fn get_all_favorites(&mut self) -> Result<Vec<(UserId, SongId)>, StoreError> {
        let rows = self.pgconn.query(
            "SELECT user_id, song_id FROM user_favorites ORDER BY user_id, song_id",
            &[],
        )?;
        rows.iter()
            .map(|row| -> Result<(UserId, SongId), StoreError> {
                Ok((UserId(row.try_get(0)?), SongId(row.try_get(1)?)))
            })
            .collect()
    }
}

fn size_to_sql<N>(n: N) -> Result<i64, StoreError>
where
    N: TryInto<i64> + Copy + std::fmt::Display,
{
    n.try_into().map_err(|_| StoreError::Corrupt(format!("{} out of range", n)))
}

fn song_from_row(row: &Row) -> Result<SongRecord, StoreError> {
    let size: i64 = row.try_get(4)?;
    Ok(SongRecord {
        id: SongId(row.try_get(0)?),
        title: row.try_get(1)?,
        artist: row.try_get(2)?,
        genre: row.try_get(3)?,
        file_size: u64::try_from(size)
            .map_err(|_| StoreError::Corrupt(format!("negative file size {}", size)))?,
        file_path: row.try_get(5)?,
    })
}

fn user_from_row(row: &Row) -> Result<UserRecord, StoreError> {
    let role: String = row.try_get(4)?;
    Ok(UserRecord {
        id: UserId(row.try_get(0)?),
        name: row.try_get(1)?,
        email: row.try_get(2)?,
        password: row.try_get(3)?,
        role: role.parse().map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
    })
}
