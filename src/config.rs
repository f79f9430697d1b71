//! Configuration management for the session client
//!
//! Settings live in a JSON file in the per-OS config directory. Every field
//! has a default, so a missing or partial file still yields a usable config.
//! Supports Windows, macOS, and Linux.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Endpoints;
use crate::auth::DEFAULT_SERVICE;

/// Environment variable overriding [`AppConfig::api_base_url`]
pub const API_URL_ENV: &str = "STOREFRONT_API_URL";

const APP_DIR: &str = "storefront-session";

/// Errors reading or writing the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend origin, e.g. `https://shop.example.com`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Prefix for API paths, e.g. `/api`; empty for none
    #[serde(default)]
    pub path_prefix: String,
    /// Per-request network timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Keyring service name the token pair is stored under
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
    /// Requested token lifetime, forwarded on login and refresh (e.g. `15m`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_in: Option<String>,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_keyring_service() -> String {
    DEFAULT_SERVICE.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            path_prefix: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            keyring_service: default_keyring_service(),
            token_expires_in: None,
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join(APP_DIR))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support").join(APP_DIR))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join(APP_DIR))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Gets the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Loads configuration from the default location
    ///
    /// Falls back to defaults when the file is missing or unreadable, then
    /// applies environment overrides.
    pub fn load() -> Self {
        let config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Ignoring config file: {}", e);
                Self::default()
            }),
            _ => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Saves configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Applies overrides from an environment lookup
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::with_prefix(&self.path_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.keyring_service, DEFAULT_SERVICE);
        assert!(config.token_expires_in.is_none());
        assert_eq!(config.endpoints().login, "/auth/login");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"api_base_url":"https://shop.test","path_prefix":"/api"}"#)
                .unwrap();

        assert_eq!(config.api_base_url, "https://shop.test");
        assert_eq!(config.endpoints().profile, "/api/user/profile");
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = AppConfig {
            api_base_url: "https://shop.test".into(),
            token_expires_in: Some("15m".into()),
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_invalid_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "{not json").unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_override() {
        let config = AppConfig::default().with_env(|key| {
            (key == API_URL_ENV).then(|| "https://staging.shop.test".to_string())
        });
        assert_eq!(config.api_base_url, "https://staging.shop.test");

        let untouched = AppConfig::default().with_env(|_| Some("  ".into()));
        assert_eq!(untouched.api_base_url, default_api_base_url());
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
