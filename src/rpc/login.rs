use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Role, UserId};

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expire_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Deserialize, Debug)]
pub struct RoleUpdateRequest {
    pub user_id: UserId,
    pub role: String,
}
