//! Connection configuration for the catalog database
//!
//! Every setting is resolved in the same priority order:
//! environment variable, then the `[database]` table of a local
//! `bibliothek.toml`, then a hardcoded default. Resolution is a pure
//! function of its inputs so it can be tested without touching the
//! process environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::StateError;
use crate::Result;

/// Endpoint used when neither the environment nor a config file names one.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000";
/// Config file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "bibliothek.toml";
pub const DEFAULT_NAMESPACE: &str = "bibliothek";
pub const DEFAULT_DATABASE: &str = "main";

pub const ENV_URL: &str = "SURREALDB_URL";
pub const ENV_NAMESPACE: &str = "SURREALDB_NAMESPACE";
pub const ENV_DATABASE: &str = "SURREALDB_DATABASE";
pub const ENV_USERNAME: &str = "SURREALDB_USERNAME";
pub const ENV_PASSWORD: &str = "SURREALDB_PASSWORD";
pub const ENV_ROOT: &str = "SURREALDB_ROOT";

/// Sign-in credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Root user (true) or database user (false)
    pub is_root: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("is_root", &self.is_root)
            .finish()
    }
}

/// Where the endpoint of a resolved [`ConnectionConfig`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Environment,
    File(PathBuf),
    Default,
}

impl fmt::Display for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSource::Environment => write!(f, "environment ({ENV_URL})"),
            ConnectionSource::File(path) => write!(f, "config file {}", path.display()),
            ConnectionSource::Default => f.write_str("built-in default"),
        }
    }
}

/// Fully resolved connection descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Endpoint URL (e.g. `ws://127.0.0.1:8000`, `surrealkv://data`, `mem://`)
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Present only when both username and password were supplied
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    url: Option<String>,
    namespace: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    root: Option<bool>,
}

impl ConnectionConfig {
    /// Configuration for an ephemeral in-memory database.
    pub fn in_memory() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }

    /// Resolve the connection from an environment lookup and an optional
    /// config file. A config file that does not exist is skipped; one that
    /// exists but cannot be parsed is an error.
    pub fn resolve<F>(env: F, config_file: Option<&Path>) -> Result<(Self, ConnectionSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let file = match config_file {
            Some(path) if path.exists() => Some((path.to_path_buf(), read_config_file(path)?)),
            _ => None,
        };
        let section = file.as_ref().map(|(_, cfg)| &cfg.database);

        let (endpoint, source) = if let Some(url) = env(ENV_URL) {
            (url, ConnectionSource::Environment)
        } else if let Some((path, url)) = file
            .as_ref()
            .and_then(|(path, cfg)| cfg.database.url.clone().map(|url| (path.clone(), url)))
        {
            (url, ConnectionSource::File(path))
        } else {
            (DEFAULT_ENDPOINT.to_string(), ConnectionSource::Default)
        };

        let namespace = env(ENV_NAMESPACE)
            .or_else(|| section.and_then(|s| s.namespace.clone()))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let database = env(ENV_DATABASE)
            .or_else(|| section.and_then(|s| s.database.clone()))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let username = env(ENV_USERNAME).or_else(|| section.and_then(|s| s.username.clone()));
        let password = env(ENV_PASSWORD).or_else(|| section.and_then(|s| s.password.clone()));
        let is_root = env(ENV_ROOT)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .or_else(|| section.and_then(|s| s.root))
            .unwrap_or(false);

        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials {
                username,
                password,
                is_root,
            }),
            _ => None,
        };

        debug!(%endpoint, %source, "resolved catalog connection");
        Ok((
            Self {
                endpoint,
                namespace,
                database,
                credentials,
            },
            source,
        ))
    }

    /// Resolve against the real process environment.
    pub fn from_env(config_file: Option<&Path>) -> Result<(Self, ConnectionSource)> {
        Self::resolve(|key| std::env::var(key).ok(), config_file)
    }
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let config_error = |reason: String| StateError::Config {
        path: path.display().to_string(),
        reason,
    };
    let contents = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    toml::from_str(&contents).map_err(|e| config_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[database]\nurl = \"ws://file:8000\"\n");
        let (config, source) =
            ConnectionConfig::resolve(env_of(&[(ENV_URL, "ws://env:8000")]), Some(&path)).unwrap();
        assert_eq!(config.endpoint, "ws://env:8000");
        assert_eq!(source, ConnectionSource::Environment);
    }

    #[test]
    fn file_used_when_environment_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[database]\nurl = \"ws://file:8000\"\nnamespace = \"ns\"\nusername = \"u\"\npassword = \"p\"\n",
        );
        let (config, source) = ConnectionConfig::resolve(env_of(&[]), Some(&path)).unwrap();
        assert_eq!(config.endpoint, "ws://file:8000");
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(source, ConnectionSource::File(path));
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "u");
        assert!(!creds.is_root);
    }

    #[test]
    fn default_used_when_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let (config, source) = ConnectionConfig::resolve(env_of(&[]), Some(&missing)).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(source, ConnectionSource::Default);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let (config, source) =
            ConnectionConfig::resolve(env_of(&[(ENV_URL, "  ")]), None).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(source, ConnectionSource::Default);
    }

    #[test]
    fn credentials_require_both_halves() {
        let (config, _) =
            ConnectionConfig::resolve(env_of(&[(ENV_USERNAME, "only-user")]), None).unwrap();
        assert!(config.credentials.is_none());

        let (config, _) = ConnectionConfig::resolve(
            env_of(&[(ENV_USERNAME, "root"), (ENV_PASSWORD, "pw"), (ENV_ROOT, "TRUE")]),
            None,
        )
        .unwrap();
        assert!(config.credentials.unwrap().is_root);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[database\nurl = ");
        let err = ConnectionConfig::resolve(env_of(&[]), Some(&path)).unwrap_err();
        assert!(matches!(err, StateError::Config { .. }));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "u".to_string(),
            password: "hunter2".to_string(),
            is_root: false,
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
