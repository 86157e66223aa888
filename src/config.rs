use std::env;
use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const API_USER_VAR: &str = "CLOCKODO_API_USER";
pub const API_KEY_VAR: &str = "CLOCKODO_API_KEY";
pub const BASE_URL_VAR: &str = "CLOCKODO_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://my.clockodo.com/api";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set to a non-empty value")]
    Missing(&'static str),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_user: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_user: api_user.into(),
            api_key: api_key.into(),
        }
    }

    /// Short SHA-256 prefix of the key, safe to show in logs.
    pub fn key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.api_key.as_bytes());
        digest
            .iter()
            .take(6)
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| -> Option<String> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_user = read(API_USER_VAR).ok_or(ConfigError::Missing(API_USER_VAR))?;
        let api_key = read(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let base_url = read(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            credentials: Credentials::new(api_user, api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }
}
