use std::io::{self, Cursor};

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder, Response};
use rocket::Request;
use tracing::error;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::model::{LibraryError, PlaybackError, SongError, UserError};
use crate::session::SessionError;

// {"error": {
//    "type": "invalid-access-token",
//    "message": "access token expired"
// }}
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new<M: Into<String>>(status: Status, kind: &'static str, message: M) -> ApiError {
        ApiError {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request<M: Into<String>>(message: M) -> ApiError {
        ApiError::new(Status::BadRequest, "validation-error", message)
    }

    pub fn not_found<M: Into<String>>(message: M) -> ApiError {
        ApiError::new(Status::NotFound, "not-found", message)
    }

    pub fn body(&self) -> String {
        serde_json::json!({
            "error": {
                "type": self.kind,
                "message": self.message,
            }
        })
        .to_string()
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = self.body();
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<SongError> for ApiError {
    fn from(e: SongError) -> ApiError {
        match e {
            SongError::MissingField(_) => ApiError::bad_request(e.to_string()),
            SongError::SizeExceeded { .. } => {
                ApiError::new(Status::PayloadTooLarge, "size-limit-exceeded", e.to_string())
            }
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> ApiError {
        let message = e.to_string();
        match e {
            LibraryError::CapacityExceeded => {
                ApiError::new(Status::Conflict, "capacity-exceeded", message)
            }
            LibraryError::DuplicateId(_) => ApiError::new(Status::Conflict, "duplicate-id", message),
            LibraryError::SizeLimitExceeded { .. } => {
                ApiError::new(Status::PayloadTooLarge, "size-limit-exceeded", message)
            }
            LibraryError::NotFound(_) => ApiError::not_found(message),
            LibraryError::SongNotInLibrary(_) => {
                ApiError::new(Status::NotFound, "song-not-in-library", message)
            }
            LibraryError::LimitExceeded(_) => {
                error!(error = %message, "library invariant violated");
                ApiError::new(Status::InternalServerError, "limit-exceeded", message)
            }
        }
    }
}

impl From<PlaybackError> for ApiError {
    fn from(e: PlaybackError) -> ApiError {
        ApiError::new(Status::Conflict, "invalid-state", e.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> ApiError {
        match e {
            SessionError::Song(e) => e.into(),
            SessionError::Library(e) => e.into(),
            SessionError::Playback(e) => e.into(),
            SessionError::NoActiveUser => {
                ApiError::new(Status::Conflict, "no-active-user", e.to_string())
            }
            SessionError::NoActivePlayback => {
                ApiError::new(Status::Conflict, "no-active-playback", e.to_string())
            }
            SessionError::SongNotPlaying { .. } => {
                ApiError::new(Status::Conflict, "invalid-state", e.to_string())
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> ApiError {
        ApiError::bad_request(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> ApiError {
        match e {
            StoreError::EmailTaken(_) => ApiError::new(Status::Conflict, "email-taken", e.to_string()),
            e => {
                error!(error = %e, "store failure");
                ApiError::new(Status::InternalServerError, "storage-unavailable", "storage unavailable")
            }
        }
    }
}

impl From<io::Error> for ApiError {
    fn from(e: io::Error) -> ApiError {
        error!(error = %e, "upload storage failure");
        ApiError::new(Status::InternalServerError, "storage-unavailable", "storage unavailable")
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> ApiError {
        let (status, kind) = match e {
            AuthError::Missing => (Status::Unauthorized, "missing-access-token"),
            AuthError::InvalidCredentials => (Status::Unauthorized, "invalid-credentials"),
            AuthError::Forbidden => (Status::Forbidden, "forbidden"),
            AuthError::Unavailable => (Status::InternalServerError, "storage-unavailable"),
            _ => (Status::Unauthorized, "invalid-access-token"),
        };
        ApiError::new(status, kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SongId;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let e: ApiError = SessionError::Library(LibraryError::CapacityExceeded).into();
        assert_eq!(e.status, Status::Conflict);
        assert_eq!(e.kind, "capacity-exceeded");

        let e: ApiError = SessionError::Playback(PlaybackError::NotPlaying).into();
        assert_eq!(e.kind, "invalid-state");

        let e: ApiError = LibraryError::SongNotInLibrary(SongId(9)).into();
        assert_eq!(e.status, Status::NotFound);
    }

    #[test]
    fn store_failures_are_opaque() {
        let e: ApiError = StoreError::Worker("panicked".to_owned()).into();
        assert_eq!(e.status, Status::InternalServerError);
        assert_eq!(e.kind, "storage-unavailable");
        assert!(!e.message.contains("panicked"));
    }

    #[test]
    fn body_uses_error_envelope() {
        let body: serde_json::Value =
            serde_json::from_str(&ApiError::bad_request("bad").body()).unwrap();
        assert_eq!(body["error"]["type"], "validation-error");
        assert_eq!(body["error"]["message"], "bad");
    }
}
