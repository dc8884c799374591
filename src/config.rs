//! Configuration manager for notekeeper.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
const ACCESS_TOKEN_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 3500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default)]
    pub name: String,
    /// Domain name of current instance.
    #[serde(default)]
    pub url: String,
    /// Listening port.
    #[serde(skip_serializing)]
    pub port: Option<u16>,
    /// Maximum time spent on a request, in seconds.
    #[serde(skip_serializing)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to the users resource.
    #[serde(default, skip_serializing)]
    pub users: Users,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing, in KiB.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    /// HMAC secret shared with the service issuing access tokens.
    pub access_token_secret: Option<String>,
}

/// Users resource configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Users {
    /// Report missing users with historical status codes:
    /// `409` on update and delete, `400` on an empty listing.
    #[serde(default)]
    pub legacy_status_codes: bool,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Port the HTTP server listens on.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Request timeout.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Access token secret; `ACCESS_TOKEN_SECRET` takes precedence over
    /// the file.
    pub fn access_token_secret(&self) -> Option<String> {
        std::env::var(ACCESS_TOKEN_SECRET_ENV)
            .ok()
            .filter(|secret| !secret.is_empty())
            .or_else(|| {
                self.token
                    .as_ref()
                    .and_then(|t| t.access_token_secret.clone())
            })
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    fn file_path(&self) -> PathBuf {
        if self.path.is_file() {
            return self.path.clone();
        }

        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => Path::new(DEFAULT_CONFIG_PATH).to_path_buf(),
        }
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = self.file_path();

        match File::open(&file_path) {
            Ok(file) => {
                let config: Configuration = match serde_yaml::from_reader(file)
                {
                    Ok(config) => config,
                    Err(err) => {
                        return Ok(Arc::new(self.error(err)));
                    },
                };

                Ok(Arc::new(self.finalize(config)?))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Apply runtime values to a freshly parsed configuration.
    fn finalize(
        &self,
        mut config: Configuration,
    ) -> Result<Configuration, url::ParseError> {
        // set app version.
        config.version = VERSION.to_owned();
        config.path = self.path.clone();

        if !config.url.is_empty() {
            config.url = self.normalize_url(&config.url)?;
        }

        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
name: notekeeper
url: notes.example.com
port: 8080
postgres:
  address: localhost:5432
  database: notes
argon2:
  memory_cost: 8192
  iterations: 1
  parallelism: 1
  hash_length: 32
token:
  access_token_secret: secret
users:
  legacy_status_codes: true
"#;

    #[test]
    fn test_parse_configuration() {
        let config: Configuration = serde_yaml::from_str(CONFIG).unwrap();
        let config = Configuration::default().finalize(config).unwrap();

        assert_eq!(config.name, "notekeeper");
        assert_eq!(config.url, "https://notes.example.com/");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.version, VERSION);
        assert!(config.users.legacy_status_codes);
        assert_eq!(
            config.postgres.as_ref().and_then(|p| p.database.as_deref()),
            Some("notes")
        );
        assert_eq!(config.argon2.map(|a| a.memory_cost), Some(8192));
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Configuration = serde_yaml::from_str("name: x").unwrap();

        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(
            config.timeout(),
            std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
        assert!(config.postgres.is_none());
        assert!(!config.users.legacy_status_codes);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Configuration::default()
            .path(PathBuf::from("/nonexistent/config.yaml"))
            .read()
            .unwrap();

        assert_eq!(config.version, VERSION);
        assert_eq!(config.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_normalize_url_keeps_scheme() {
        let config = Configuration::default();

        assert_eq!(
            config.normalize_url("http://localhost:3500").unwrap(),
            "http://localhost:3500/"
        );
    }
}
