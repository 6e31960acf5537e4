use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(val: &str) -> Result<Role, UserError> {
        match val {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UserError {
    #[error("all fields are required: name, email and password")]
    MissingField,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// A validated registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Result<Registration, UserError> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(UserError::MissingField);
        }
        Ok(Registration {
            name: name.trim().to_owned(),
            email: email.trim().to_lowercase(),
            password: password.to_owned(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_requires_every_field() {
        assert_eq!(
            Registration::new("", "a@b.c", "pw").unwrap_err(),
            UserError::MissingField
        );
        assert_eq!(
            Registration::new("Ana", "", "pw").unwrap_err(),
            UserError::MissingField
        );
        assert_eq!(
            Registration::new("Ana", "a@b.c", "").unwrap_err(),
            UserError::MissingField
        );
    }

    #[test]
    fn registration_normalizes_email() {
        let reg = Registration::new(" Ana Gomez ", " Ana.Gomez@Example.com", "secret").unwrap();
        assert_eq!(reg.name, "Ana Gomez");
        assert_eq!(reg.email, "ana.gomez@example.com");
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.as_str(), "user");
        assert!("root".parse::<Role>().is_err());
    }
}
