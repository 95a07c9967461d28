//! Configuration management.
//!
//! This module resolves the database path and the API server settings.
//!
//! # Sources
//!
//! Values come from, in order:
//! 1. Explicit CLI flags
//! 2. Process environment
//! 3. A `.env` file in the working directory or a parent, loaded at startup
//! 4. Built-in defaults (`~/.kai/data/kai.db`, `127.0.0.1:8080`)

use crate::error::{Error, Result};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default bind address for `kai serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Shared token used when `API_SHARED_TOKEN` is unset.
pub const DEFAULT_TOKEN: &str = "changeme-token";

/// Load a `.env` file into the process environment.
///
/// Existing environment variables win over file entries. Runs before
/// argument parsing and logging setup, so it returns what happened instead
/// of logging: the loaded path, `None` if there is no file, or an error for
/// a file that exists but can't be read.
///
/// # Errors
///
/// Returns [`Error::Config`] if a `.env` file was found but is unreadable.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::Config(format!("unreadable .env: {e}"))),
    }
}

/// Get the global Kai directory location (`~/.kai/`).
#[must_use]
pub fn global_kai_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".kai"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `KAI_DB` environment variable
/// 3. Global location: `~/.kai/data/kai.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("KAI_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_kai_dir().map(|dir| dir.join("data").join("kai.db"))
}

/// Settings for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the server listens on.
    pub bind: SocketAddr,
    /// Shared bearer token every backup request must carry.
    pub token: String,
}

impl ServerConfig {
    /// Build from explicit values, falling back to `KAI_BIND`,
    /// `API_SHARED_TOKEN`, then the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the bind address doesn't parse or the
    /// token is empty.
    pub fn resolve(bind: Option<&str>, token: Option<&str>) -> Result<Self> {
        let bind = bind
            .map(ToString::to_string)
            .or_else(|| std::env::var("KAI_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let token = token
            .map(ToString::to_string)
            .or_else(|| std::env::var("API_SHARED_TOKEN").ok())
            .unwrap_or_else(|| DEFAULT_TOKEN.to_string());

        Self::new(&bind, token)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if `bind` doesn't parse or `token` is empty.
    pub fn new(bind: &str, token: String) -> Result<Self> {
        let bind = bind
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address '{bind}': {e}")))?;
        if token.trim().is_empty() {
            return Err(Error::Config("API_SHARED_TOKEN must not be empty".to_string()));
        }
        Ok(Self { bind, token })
    }

    /// True if the server would run with the well-known default token.
    #[must_use]
    pub fn uses_default_token(&self) -> bool {
        self.token == DEFAULT_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_db_path_wins() {
        let path = Path::new("/tmp/kai-test.db");
        assert_eq!(resolve_db_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_server_config_parses_bind() {
        let config = ServerConfig::new("0.0.0.0:9000", "secret".to_string()).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert!(!config.uses_default_token());
    }

    #[test]
    fn test_server_config_rejects_bad_input() {
        assert!(matches!(
            ServerConfig::new("not-an-address", "secret".to_string()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServerConfig::new(DEFAULT_BIND, "  ".to_string()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_explicit_values_skip_env() {
        let config = ServerConfig::resolve(Some("127.0.0.1:1234"), Some(DEFAULT_TOKEN)).unwrap();
        assert_eq!(config.bind.to_string(), "127.0.0.1:1234");
        assert!(config.uses_default_token());
    }
}
