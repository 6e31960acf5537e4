use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::uploads::{LocalUploads, UploadBackend};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config: {0}")]
    Io(#[from] io::Error),

    #[error("error parsing config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub secret: String,
    pub database: DatabaseConfig,
    pub uploads: UploadDriverConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        let raw = fs::read_to_string(path)?;
        AppConfig::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<AppConfig, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub read_url: Option<String>,
    pub write_url: String,
}

impl DatabaseConfig {
    pub fn read_url(&self) -> &str {
        if let Some(ref url) = self.read_url {
            return url;
        }
        &self.write_url
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "driver_name")]
pub enum UploadDriverConfig {
    #[serde(rename = "local")]
    Local(LocalDriver),
}

#[derive(Deserialize, Debug, Clone)]
pub struct LocalDriver {
    pub base_dir: PathBuf,
}

impl UploadDriverConfig {
    pub fn boxed(&self) -> Box<dyn UploadBackend> {
        match *self {
            UploadDriverConfig::Local(ref cfg) => Box::new(LocalUploads::new(&cfg.base_dir)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WebConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    pub address: Option<IpAddr>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LibraryConfig {
    /// User context owning the in-memory library.
    pub owner_id: i64,
}

impl Default for LibraryConfig {
    fn default() -> LibraryConfig {
        LibraryConfig { owner_id: 1 }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
    /// Accounts registered with one of these emails get the admin role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

fn default_token_ttl() -> i64 {
    24 * 3600
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

impl Default for AuthConfig {
    fn default() -> AuthConfig {
        AuthConfig {
            token_ttl_secs: default_token_ttl(),
            admin_emails: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = AppConfig::parse(r#"
            secret = "hunter2"

            [database]
            write_url = "mock://memory"

            [uploads]
            driver_name = "local"
            base_dir = "./uploads/songs"
        "#).unwrap();

        assert_eq!(config.database.read_url(), "mock://memory");
        assert_eq!(config.library.owner_id, 1);
        assert_eq!(config.auth.token_ttl_secs, 86400);
        assert!(config.web.allow_origins.is_empty());
        let UploadDriverConfig::Local(ref local) = config.uploads;
        assert_eq!(local.base_dir, PathBuf::from("./uploads/songs"));
    }

    #[test]
    fn read_url_overrides_write_url() {
        let config = AppConfig::parse(r#"
            secret = "s"

            [database]
            read_url = "postgresql://replica/music"
            write_url = "postgresql://primary/music"

            [uploads]
            driver_name = "local"
            base_dir = "/srv/uploads"

            [web]
            allow_origins = ["http://localhost:3000"]
            port = 8080

            [auth]
            token_ttl_secs = 60
            admin_emails = ["Root@Example.com"]
        "#).unwrap();

        assert_eq!(config.database.read_url(), "postgresql://replica/music");
        assert_eq!(config.database.write_url(), "postgresql://primary/music");
        assert_eq!(config.web.port, Some(8080));
        assert_eq!(config.auth.token_ttl_secs, 60);
        assert!(config.auth.is_admin_email("root@example.com"));
        assert!(!config.auth.is_admin_email("ana@example.com"));
    }

    #[test]
    fn rejects_unknown_upload_driver() {
        let err = AppConfig::parse(r#"
            secret = "s"
            [database]
            write_url = "mock://memory"
            [uploads]
            driver_name = "s3"
        "#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
