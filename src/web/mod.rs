use rocket::data::{Limits, ToByteUnit};
use rocket::http::Status;
use rocket::{Build, Request, Rocket};
use tracing::{info, warn};

use crate::auth::Authority;
use crate::config::AppConfig;
use crate::database::{Database, SongQuery, StoreError};
use crate::model::{Library, UserId, MAX_SONG_SIZE};
use crate::rpc::ApiError;
use crate::session::StreamingSession;
use crate::uploads::UploadBackend;

mod admin;
mod cors;
mod favorites;
mod songs;
mod users;

pub use self::cors::Cors;

/// Managed upload storage.
pub struct Uploads(pub Box<dyn UploadBackend>);

impl std::ops::Deref for Uploads {
    type Target = dyn UploadBackend;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("error loading library: {0}")]
    Store(#[from] StoreError),
}

/// Rebuilds the in-memory library from the store. Songs the library refuses
/// are logged and skipped.
pub fn load_session(config: &AppConfig, database: &Database) -> Result<StreamingSession, StartupError> {
    let session = StreamingSession::new(Library::new(UserId(config.library.owner_id)));

    let records = database.read_blocking(|conn| conn.get_songs(&SongQuery::default()))?;
    let mut loaded = 0;
    for record in records {
        let song = match record.to_song() {
            Ok(song) => song,
            Err(e) => {
                warn!(song_id = %record.id, error = %e, "skipping invalid song record");
                continue;
            }
        };
        match session.add_song(song) {
            Ok(()) => loaded += 1,
            Err(e) => warn!(song_id = %record.id, error = %e, "skipping song"),
        }
    }

    let favorites = database.read_blocking(|conn| conn.get_all_favorites())?;
    for (user, song) in favorites {
        if let Err(e) = session.add_favorite(user, song) {
            warn!(user_id = %user, song_id = %song, error = %e, "skipping favorite");
        }
    }

    info!(songs = loaded, "library loaded");
    Ok(session)
}

pub fn rocket(config: &AppConfig, database: Database) -> Result<Rocket<Build>, StartupError> {
    let session = load_session(config, &database)?;

    let limits = Limits::default()
        .limit("file", MAX_SONG_SIZE.bytes())
        .limit("data-form", (MAX_SONG_SIZE + 1024 * 1024).bytes());
    let mut figment = rocket::Config::figment().merge(("limits", limits));
    if let Some(address) = config.web.address {
        figment = figment.merge(("address", address));
    }
    if let Some(port) = config.web.port {
        figment = figment.merge(("port", port));
    }

    Ok(rocket::custom(figment)
        .attach(Cors::new(&config.web.allow_origins))
        .manage(session)
        .manage(database)
        .manage(Authority::new(config.secret.as_bytes(), config.auth.token_ttl_secs))
        .manage(Uploads(config.uploads.boxed()))
        .manage(config.auth.clone())
        .mount("/api", rocket::routes![
            cors::preflight,
            users::login,
            users::logout,
            users::register,
            users::profile,
            songs::list_songs,
            songs::get_song,
            songs::add_song,
            songs::upload_song,
            songs::delete_song,
            songs::search_songs,
            songs::play_song,
            songs::pause_song,
            songs::resume_song,
            songs::complete_song,
            songs::current_playback,
            songs::library_stats,
            songs::recommendations,
            favorites::add_favorite,
            favorites::remove_favorite,
            favorites::list_favorites,
            admin::list_users,
            admin::update_user_role,
            admin::delete_user,
        ])
        .register("/", rocket::catchers![default_catcher]))
}

#[rocket::catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> ApiError {
    let kind = match status.code {
        400 => "validation-error",
        401 => "invalid-access-token",
        403 => "forbidden",
        404 => "not-found",
        413 => "size-limit-exceeded",
        422 => "validation-error",
        _ => "internal-error",
    };
    ApiError::new(status, kind, status.reason_lossy())
}
