use rocket::serde::json::Json;
use rocket::{delete, get, put, State};
use tracing::info;

use crate::auth::{AdminUser, Authority};
use crate::database::Database;
use crate::model::{Role, User, UserId};
use crate::rpc::{ApiError, MessageResponse, RoleUpdateRequest};
use crate::session::StreamingSession;

#[get("/admin/users")]
pub async fn list_users(
    db: &State<Database>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = db.read(|conn| conn.list_users()).await?;
    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

#[put("/admin/users", format = "json", data = "<req>")]
pub async fn update_user_role(
    db: &State<Database>,
    admin: AdminUser,
    req: Json<RoleUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    let Json(req) = req;
    let role: Role = req.role.trim().to_lowercase().parse()?;
    let target = req.user_id;

    let updated = db.write(move |conn| conn.update_user_role(target, role)).await?;
    match updated {
        Some(account) => {
            info!(admin_id = %admin.0.user_id, user_id = %target, role = role.as_str(), "role updated");
            Ok(Json(account.profile()))
        }
        None => Err(ApiError::not_found(format!("user {} not found", target))),
    }
}

#[delete("/admin/users?<id>")]
pub async fn delete_user(
    session: &State<StreamingSession>,
    db: &State<Database>,
    authority: &State<Authority>,
    admin: AdminUser,
    id: Option<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let target = match id {
        Some(id) => UserId(id),
        None => return Err(ApiError::bad_request("user id is required")),
    };
    if target == admin.0.user_id {
        return Err(ApiError::bad_request("administrators cannot delete their own account"));
    }

    let deleted = db.write(move |conn| conn.delete_user(target)).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("user {} not found", target)));
    }
    authority.revoke_user(target);
    session.forget_user(target);
    info!(admin_id = %admin.0.user_id, user_id = %target, "user deleted");
    Ok(Json(MessageResponse {
        message: "user deleted",
    }))
}
