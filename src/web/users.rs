use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, AuthError, AuthenticatedUser, Authority};
use crate::config::AuthConfig;
use crate::database::{Database, NewUser};
use crate::model::{Registration, Role, User, UserId};
use crate::rpc::{
    ApiError,
    LoginRequest,
    LoginResponse,
    MessageResponse,
    RegisterRequest,
};
use crate::session::StreamingSession;

#[post("/login", format = "json", data = "<login>")]
pub async fn login(
    session: &State<StreamingSession>,
    db: &State<Database>,
    authority: &State<Authority>,
    login: Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(login) = login;
    let email = login.email.trim().to_lowercase();

    let account = db.read(move |conn| conn.find_user_by_email(&email)).await?;
    let account = match account {
        Some(account) if verify_password(&login.password, &account.password) => account,
        _ => {
            warn!("rejected login");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let issued = authority.issue(account.id)?;
    session.activate_user(account.id, issued.info.token_id(), issued.info.expires_at());
    info!(user_id = %account.id, "user logged in");

    Ok(Json(LoginResponse {
        id: account.id,
        name: account.name,
        email: account.email,
        role: account.role,
        token: issued.token,
        expire_at: issued.info.expires_at(),
    }))
}

#[post("/logout")]
pub fn logout(
    session: &State<StreamingSession>,
    authority: &State<Authority>,
    caller: AuthenticatedUser,
) -> Json<MessageResponse> {
    authority.revoke(&caller.token);
    session.deactivate_user(caller.token.token_id());
    info!(user_id = %caller.user_id, "user logged out");
    Json(MessageResponse {
        message: "logged out",
    })
}

#[post("/users/register", format = "json", data = "<req>")]
pub async fn register(
    db: &State<Database>,
    auth: &State<AuthConfig>,
    req: Json<RegisterRequest>,
) -> Result<(Status, Json<User>), ApiError> {
    let Json(req) = req;
    let registration = Registration::new(&req.name, &req.email, &req.password)?;
    let password = hash_password(&registration.password).map_err(|e| {
        ApiError::new(Status::InternalServerError, "internal-error", e.to_string())
    })?;
    let role = if auth.is_admin_email(&registration.email) {
        Role::Admin
    } else {
        Role::User
    };
    let new_user = NewUser {
        name: registration.name,
        email: registration.email,
        password,
        role,
    };

    let account = db.write(move |conn| conn.create_user(&new_user)).await?;
    info!(user_id = %account.id, role = account.role.as_str(), "user registered");
    Ok((Status::Created, Json(account.profile())))
}

#[get("/users/profile?<id>")]
pub async fn profile(
    db: &State<Database>,
    caller: AuthenticatedUser,
    id: Option<i64>,
) -> Result<Json<User>, ApiError> {
    let id = id.map(UserId).unwrap_or(caller.user_id);
    let account = db.read(move |conn| conn.get_user(id)).await?;
    match account {
        Some(account) => Ok(Json(account.profile())),
        None => Err(ApiError::not_found(format!("user {} not found", id))),
    }
}
