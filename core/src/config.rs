//! Client configuration.

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1/todos";

/// Environment variable overriding the collection root.
pub const BASE_URL_ENV: &str = "TODO_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// URL of the collection root; items live at `{base_url}/{id}`.
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
        })
    }

    /// Read `TODO_API_BASE_URL`, falling back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup(BASE_URL_ENV) {
            Some(url) if !url.trim().is_empty() => Self::new(url),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}
