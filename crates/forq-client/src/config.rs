//! Client configuration and loading.
//!
//! Sources, later ones overriding earlier ones:
//!  1. An optional file (toml, yaml or json, chosen by extension)
//!  2. Environment variables prefixed `FORQ_`, e.g. `FORQ_SERVER_URL`

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FORQ";

const REDACTED: &str = "<redacted>";

/// Settings needed to reach a queue server
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `https://queue.example.com`
    #[serde(default)]
    pub server_url: String,

    /// Shared secret sent with every request
    #[serde(default)]
    pub auth_secret: String,

    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            auth_secret: String::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl ClientConfig {
    /// Create configuration with the default request timeout
    pub fn new(server_url: impl Into<String>, auth_secret: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            auth_secret: auth_secret.into(),
            ..Self::default()
        }
    }

    /// Set the per-request timeout, `None` disabling it.
    ///
    /// The timeout is stored in whole seconds, rounded up, so a sub-second
    /// timeout never turns into "disabled".
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_seconds = timeout
            .map(|t| t.as_secs() + u64::from(t.subsec_nanos() > 0))
            .unwrap_or(0);
        self
    }

    /// Per-request timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Load configuration from an optional file plus `FORQ_*` environment
    /// variables, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check that all required settings are present and well formed
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.auth_secret.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "auth_secret".to_string(),
            });
        }
        self.base_url().map(|_| ())
    }

    /// Parsed server URL with any trailing slash removed from its path
    pub fn base_url(&self) -> Result<Url, ConfigurationError> {
        if self.server_url.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "server_url".to_string(),
            });
        }

        let mut url = Url::parse(&self.server_url).map_err(|e| ConfigurationError::Invalid {
            message: format!("server_url '{}': {}", self.server_url, e),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigurationError::Invalid {
                message: format!("server_url must use http or https, got '{}'", url.scheme()),
            });
        }

        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        Ok(url)
    }

    /// Server URL in the form requests are built from, without a trailing slash
    pub fn normalized_server_url(&self) -> Result<String, ConfigurationError> {
        Ok(self.base_url()?.as_str().trim_end_matches('/').to_string())
    }

    /// Copy safe to print or serialize, with the server URL normalized when
    /// it parses
    pub fn redacted(&self) -> Self {
        Self {
            server_url: self
                .normalized_server_url()
                .unwrap_or_else(|_| self.server_url.clone()),
            auth_secret: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("auth_secret", &REDACTED)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
