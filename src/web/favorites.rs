use rocket::serde::json::Json;
use rocket::{get, post, State};
use tracing::warn;

use crate::auth::AuthenticatedUser;
use crate::database::Database;
use crate::rpc::{ApiError, FavoriteRequest, MessageResponse, SongSetResponse};
use crate::session::StreamingSession;

#[post("/favorites/add", format = "json", data = "<req>")]
pub async fn add_favorite(
    session: &State<StreamingSession>,
    db: &State<Database>,
    caller: AuthenticatedUser,
    req: Json<FavoriteRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = caller.user_id;
    let song = req.song_id;
    let was_favorite = session.is_favorite(user, song);
    session.add_favorite(user, song)?;

    if let Err(e) = db.write(move |conn| conn.add_favorite(user, song)).await {
        if !was_favorite {
            if let Err(undo) = session.remove_favorite(user, song) {
                warn!(error = %undo, "failed to undo favorite");
            }
        }
        return Err(e.into());
    }
    Ok(Json(MessageResponse {
        message: "favorite added",
    }))
}

#[post("/favorites/remove", format = "json", data = "<req>")]
pub async fn remove_favorite(
    session: &State<StreamingSession>,
    db: &State<Database>,
    caller: AuthenticatedUser,
    req: Json<FavoriteRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = caller.user_id;
    let song = req.song_id;
    let was_favorite = session.is_favorite(user, song);
    session.remove_favorite(user, song)?;

    if let Err(e) = db.write(move |conn| conn.remove_favorite(user, song)).await {
        if was_favorite {
            if let Err(undo) = session.add_favorite(user, song) {
                warn!(error = %undo, "failed to restore favorite");
            }
        }
        return Err(e.into());
    }
    Ok(Json(MessageResponse {
        message: "favorite removed",
    }))
}

#[get("/favorites")]
pub fn list_favorites(
    session: &State<StreamingSession>,
    caller: AuthenticatedUser,
) -> Json<SongSetResponse> {
    Json(session.favorites(caller.user_id).into())
}
