use rocket::form::{self, error::ErrorKind, Form};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, FromForm, State};
use tracing::{info, warn};

use super::Uploads;
use crate::auth::AuthenticatedUser;
use crate::database::{Database, NewSong};
use crate::model::{format_size, Song, SongError, SongId, MAX_SONGS, MAX_SONG_SIZE};
use crate::rpc::{
    AddSongRequest,
    ApiError,
    LibraryStatsResponse,
    PlaybackResponse,
    RecommendationsResponse,
    SongObject,
    SongSetResponse,
    UploadResponse,
};
use crate::session::StreamingSession;

/// Persists a song, then indexes it in the library. When the library
/// refuses it the row is deleted again so both sides agree.
async fn register_song(
    session: &StreamingSession,
    db: &Database,
    new_song: NewSong,
) -> Result<Song, ApiError> {
    // cheap validation before touching the store
    Song::new(SongId(0), &new_song.title, &new_song.artist, &new_song.genre, new_song.file_size)?;

    let record = db.write(move |conn| conn.insert_song(&new_song)).await?;
    let added = record
        .to_song()
        .map_err(ApiError::from)
        .and_then(|song| {
            session.add_song(song.clone())?;
            Ok(song)
        });

    match added {
        Ok(song) => {
            info!(song_id = %song.id(), title = song.title(), "song registered");
            Ok(song)
        }
        Err(e) => {
            let id = record.id;
            if let Err(cleanup) = db.write(move |conn| conn.delete_song(id)).await {
                warn!(song_id = %id, error = %cleanup, "failed to roll back song row");
            }
            Err(e)
        }
    }
}

#[get("/songs?<genre>")]
pub fn list_songs(
    session: &State<StreamingSession>,
    _caller: AuthenticatedUser,
    genre: Option<&str>,
) -> Json<SongSetResponse> {
    let songs = match genre {
        Some(genre) => session.songs_by_genre(genre),
        None => session.library(),
    };
    Json(songs.into())
}

#[get("/songs/<id>")]
pub fn get_song(
    session: &State<StreamingSession>,
    _caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<SongObject>, ApiError> {
    let song = session.get_song(SongId(id))?;
    Ok(Json(song.into()))
}

#[post("/songs/add", format = "json", data = "<req>")]
pub async fn add_song(
    session: &State<StreamingSession>,
    db: &State<Database>,
    _caller: AuthenticatedUser,
    req: Json<AddSongRequest>,
) -> Result<(Status, Json<SongObject>), ApiError> {
    let Json(req) = req;
    let new_song = NewSong {
        title: req.title,
        artist: req.artist,
        genre: req.genre,
        file_size: req.file_size,
        file_path: req.file_path,
    };
    let song = register_song(session, db, new_song).await?;
    Ok((Status::Created, Json(song.into())))
}

#[derive(FromForm)]
pub struct SongUpload<'r> {
    #[field(name = "songFile")]
    song_file: TempFile<'r>,
    title: String,
    artist: String,
    genre: String,
}

#[post("/songs/upload", data = "<upload>")]
pub async fn upload_song(
    session: &State<StreamingSession>,
    db: &State<Database>,
    uploads: &State<Uploads>,
    _caller: AuthenticatedUser,
    upload: Result<Form<SongUpload<'_>>, form::Errors<'_>>,
) -> Result<(Status, Json<UploadResponse>), ApiError> {
    let mut upload = upload.map_err(upload_error)?.into_inner();

    let size = upload.song_file.len();
    if size > MAX_SONG_SIZE {
        return Err(SongError::SizeExceeded { size }.into());
    }
    Song::new(SongId(0), &upload.title, &upload.artist, &upload.genre, size)?;

    let file_name = upload
        .song_file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_owned())
        .unwrap_or_default();
    let path = uploads.allocate(&file_name)?;
    if let Err(e) = upload.song_file.copy_to(&path).await {
        uploads.discard(&path);
        return Err(e.into());
    }

    let new_song = NewSong {
        title: upload.title,
        artist: upload.artist,
        genre: upload.genre,
        file_size: size,
        file_path: Some(path.display().to_string()),
    };
    match register_song(session, db, new_song).await {
        Ok(song) => Ok((Status::Created, Json(UploadResponse {
            id: song.id(),
            message: "song uploaded",
            song: song.into(),
        }))),
        Err(e) => {
            uploads.discard(&path);
            Err(e)
        }
    }
}

/// Parse failures caused by the size limits are reported like any other
/// oversized song.
fn upload_error(errors: form::Errors<'_>) -> ApiError {
    let too_large = errors
        .iter()
        .any(|e| matches!(e.kind, ErrorKind::InvalidLength { max: Some(_), .. }));
    if too_large {
        warn!("rejected oversized upload");
        return ApiError::new(
            Status::PayloadTooLarge,
            "size-limit-exceeded",
            format!("song file exceeds the {} limit", format_size(MAX_SONG_SIZE)),
        );
    }
    ApiError::bad_request(format!("invalid upload: {}", errors))
}

#[delete("/songs/<id>")]
pub async fn delete_song(
    session: &State<StreamingSession>,
    db: &State<Database>,
    _caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<SongObject>, ApiError> {
    let id = SongId(id);
    let deleted = db.write(move |conn| conn.delete_song(id)).await?;
    if !deleted {
        warn!(song_id = %id, "song missing from store");
    }
    let song = session.remove_song(id)?;
    Ok(Json(song.into()))
}

#[get("/songs/search?<q>")]
pub fn search_songs(
    session: &State<StreamingSession>,
    _caller: AuthenticatedUser,
    q: Option<&str>,
) -> Result<Json<SongSetResponse>, ApiError> {
    let query = q.map(str::trim).unwrap_or("");
    if query.is_empty() {
        return Err(ApiError::bad_request("search parameter q is required"));
    }
    Ok(Json(session.search(query).into()))
}

#[post("/songs/play/<id>")]
pub fn play_song(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<PlaybackResponse>, ApiError> {
    // a verified token is a live context, also after a restart
    session.activate_user(caller.user_id, caller.token.token_id(), caller.token.expires_at());
    let playback = session.play_song(caller.user_id, SongId(id))?;
    Ok(Json(playback.into()))
}

#[post("/songs/pause/<id>")]
pub fn pause_song(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let playback = session.pause_song(caller.user_id, SongId(id))?;
    Ok(Json(playback.into()))
}

#[post("/songs/resume/<id>")]
pub fn resume_song(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let playback = session.resume_song(caller.user_id, SongId(id))?;
    Ok(Json(playback.into()))
}

#[post("/songs/complete/<id>")]
pub fn complete_song(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
    id: i64,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let playback = session.complete_song(caller.user_id, SongId(id))?;
    Ok(Json(playback.into()))
}

#[get("/playback")]
pub fn current_playback(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
) -> Result<Json<PlaybackResponse>, ApiError> {
    match session.current_playback(caller.user_id) {
        Some(playback) => Ok(Json(playback.into())),
        None => Err(ApiError::new(Status::NotFound, "no-active-playback", "no active playback")),
    }
}

#[get("/library/stats")]
pub fn library_stats(
    session: &State<StreamingSession>,
    _caller: AuthenticatedUser,
) -> Json<LibraryStatsResponse> {
    Json(LibraryStatsResponse {
        stats: session.stats(),
        available_space_mb: session.available_space_mb(),
        last_updated: session.last_updated(),
    })
}

const DEFAULT_RECOMMENDATIONS: usize = 5;

/// Newest songs per genre. Without explicit genres, the genres of the
/// caller's favorites are used.
#[get("/recommendations?<genre>&<limit>")]
pub async fn recommendations(
    session: &State<StreamingSession>,
    db: &State<Database>,
    caller: AuthenticatedUser,
    genre: Vec<String>,
    limit: Option<usize>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let per_genre = limit.unwrap_or(DEFAULT_RECOMMENDATIONS).clamp(1, MAX_SONGS);
    let user = caller.user_id;
    let mut genres: Vec<String> = genre
        .into_iter()
        .map(|g| g.trim().to_owned())
        .filter(|g| !g.is_empty())
        .collect();

    let found = db
        .read(move |conn| {
            if genres.is_empty() {
                genres = conn.get_favorites(user)?.into_iter().map(|s| s.genre).collect();
                genres.sort();
                genres.dedup();
            }
            conn.get_recommendations(&genres, per_genre)
        })
        .await?;

    let recommendations = found
        .into_iter()
        .map(|(genre, records)| {
            let songs: Vec<SongObject> = records
                .iter()
                .filter_map(|r| session.get_song(r.id).ok())
                .map(SongObject::from)
                .collect();
            (genre, songs)
        })
        .collect();
    Ok(Json(RecommendationsResponse { recommendations }))
}
