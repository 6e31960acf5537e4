use std::collections::HashMap;

use bincode::Options;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::model::{Role, UserId};

mod password;
pub use self::password::{hash_password, verify_password};

const TOKEN_VERSION: i32 = 1;
const ENVELOPE_LIMIT: u64 = 256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing access token")]
    Missing,

    #[error("malformed access token")]
    Malformed,

    #[error("unsupported token version {0}")]
    UnsupportedVersion(i32),

    #[error("invalid token signature")]
    BadSignature,

    #[error("access token expired")]
    Expired,

    #[error("access token revoked")]
    Revoked,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("administrator role required")]
    Forbidden,

    #[error("account lookup failed")]
    Unavailable,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthTokenInfo {
    user_id: i64,
    token_id: [u8; 16],
    exp: i64,
}

impl AuthTokenInfo {
    fn new(user_id: UserId, exp: DateTime<Utc>) -> AuthTokenInfo {
        AuthTokenInfo {
            user_id: user_id.0,
            token_id: *Uuid::new_v4().as_bytes(),
            exp: exp.timestamp(),
        }
    }

    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }

    pub fn token_id(&self) -> Uuid {
        Uuid::from_bytes(self.token_id)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.exp
    }
}

#[derive(Serialize, Deserialize)]
struct SigEnvelope {
    ver: i32,
    sig: [u8; 32],
    data: Vec<u8>,
}

fn envelope_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(ENVELOPE_LIMIT)
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub info: AuthTokenInfo,
}

/// Issues and checks HMAC-SHA256 signed bearer tokens.
pub struct Authority {
    secret: Vec<u8>,
    ttl: Duration,
    // token id -> expiry (unix seconds)
    revoked: Mutex<HashMap<Uuid, i64>>,
    // user id -> latest expiry of any token issued before the revocation
    revoked_users: Mutex<HashMap<UserId, i64>>,
}

impl Authority {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Authority {
        Authority {
            secret: secret.to_owned(),
            ttl: Duration::seconds(ttl_secs),
            revoked: Mutex::new(HashMap::new()),
            revoked_users: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, AuthError> {
        let info = AuthTokenInfo::new(user_id, Utc::now() + self.ttl);
        let data = envelope_options()
            .serialize(&info)
            .map_err(|_| AuthError::Malformed)?;
        let envelope = SigEnvelope {
            ver: TOKEN_VERSION,
            sig: self.sign(&data)?,
            data,
        };
        let out = envelope_options()
            .serialize(&envelope)
            .map_err(|_| AuthError::Malformed)?;
        Ok(IssuedToken {
            token: hex::encode(out),
            info,
        })
    }

    pub fn verify(&self, token: &str) -> Result<AuthTokenInfo, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AuthTokenInfo, AuthError> {
        let envelope_data = hex::decode(token.trim()).map_err(|e| {
            debug!(error = %e, "error dehexing token");
            AuthError::Malformed
        })?;
        let envelope: SigEnvelope = envelope_options()
            .deserialize(&envelope_data)
            .map_err(|e| {
                debug!(error = %e, "error deserializing envelope");
                AuthError::Malformed
            })?;
        if envelope.ver != TOKEN_VERSION {
            return Err(AuthError::UnsupportedVersion(envelope.ver));
        }
        self.check_sig(&envelope)?;

        let info: AuthTokenInfo = envelope_options()
            .deserialize(&envelope.data)
            .map_err(|_| AuthError::Malformed)?;
        if !info.is_valid_at(now) {
            return Err(AuthError::Expired);
        }
        if self.revoked.lock().contains_key(&info.token_id()) {
            return Err(AuthError::Revoked);
        }
        if self.revoked_users.lock().contains_key(&info.user_id()) {
            return Err(AuthError::Revoked);
        }
        Ok(info)
    }

    pub fn revoke(&self, info: &AuthTokenInfo) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.lock();
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(info.token_id(), info.exp);
    }

    /// Invalidates every token issued to `user_id` so far. User ids are
    /// never reused, so the entry only has to outlive those tokens.
    pub fn revoke_user(&self, user_id: UserId) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked_users.lock();
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(user_id, (Utc::now() + self.ttl).timestamp());
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::BadSignature)
    }

    fn sign(&self, data: &[u8]) -> Result<[u8; 32], AuthError> {
        let mut mac = self.mac()?;
        mac.update(data);
        let mut sig = [0; 32];
        sig.copy_from_slice(&mac.finalize().into_bytes());
        Ok(sig)
    }

    fn check_sig(&self, env: &SigEnvelope) -> Result<(), AuthError> {
        let mut mac = self.mac()?;
        mac.update(&env.data);
        mac.verify_slice(&env.sig).map_err(|_| AuthError::BadSignature)
    }
}

/// Request guard for routes that need a signed-in caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub token: AuthTokenInfo,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let authority = match request.rocket().state::<Authority>() {
            Some(authority) => authority,
            None => return Outcome::Error((Status::InternalServerError, AuthError::Missing)),
        };

        let bearer = request
            .headers()
            .get("Authorization")
            .find_map(|value| deprefix("bearer ", value));
        let bearer = match bearer {
            Some(bearer) => bearer,
            None => return Outcome::Error((Status::Unauthorized, AuthError::Missing)),
        };

        match authority.verify(bearer) {
            Ok(token) => Outcome::Success(AuthenticatedUser {
                user_id: token.user_id(),
                token,
            }),
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

/// Request guard for administrator-only routes. The role is looked up in
/// the store on each request, so a role change applies immediately.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let caller = try_outcome!(request.guard::<AuthenticatedUser>().await);
        let database = match request.rocket().state::<Database>() {
            Some(database) => database,
            None => return Outcome::Error((Status::InternalServerError, AuthError::Unavailable)),
        };

        let user_id = caller.user_id;
        match database.read(move |conn| conn.get_user(user_id)).await {
            Ok(Some(account)) if account.role == Role::Admin => Outcome::Success(AdminUser(caller)),
            Ok(_) => {
                warn!(user_id = %user_id, "non-admin caller on admin route");
                Outcome::Error((Status::Forbidden, AuthError::Forbidden))
            }
            Err(e) => {
                error!(error = %e, "error loading caller account");
                Outcome::Error((Status::InternalServerError, AuthError::Unavailable))
            }
        }
    }
}

fn deprefix<'a>(prefix: &'static str, value: &'a str) -> Option<&'a str> {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&value[prefix.len()..]),
        _ => None,
    }
}
