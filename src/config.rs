//! Layered configuration for the status server and its clients.
//!
//! Settings are resolved lowest to highest: built-in defaults, an optional
//! TOML file, then environment variables and command-line flags (both
//! handled by clap in `main.rs` and applied here as [`ServerOverrides`]).
//!
//! # Configuration File Format
//!
//! ```toml
//! poll_interval = "10s"
//! bind_address = "0.0.0.0:8080"
//! cors = false
//!
//! [auth]
//! algorithm = "HS512"
//! secret = "change-me"
//!
//! [gitlab]
//! base_url = "https://gitlab.example.com"
//! token = "glpat-..."
//! api_path = "/api/v4"
//! ```

use std::path::Path;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Deserializer, Serialize};

use crate::client::backoff::BackoffConfig;
use crate::errors::ConfigError;

/// Default polling cadence against the CI server.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Bearer-token settings for the pull endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Shared signing secret. Absent means every request is authorized.
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            secret: None,
        }
    }
}

fn default_algorithm() -> String {
    "HS512".to_string()
}

/// Connection settings for the upstream GitLab server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_path")]
    pub api_path: String,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            api_path: default_api_path(),
        }
    }
}

fn default_api_path() -> String {
    "/api/v4".to_string()
}

/// Full server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub poll_interval: Duration,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Permissive CORS for browser dashboards.
    #[serde(default)]
    pub cors: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gitlab: GitLabConfig,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_bind_address() -> String {
    "0.0.0.0:80".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            bind_address: default_bind_address(),
            cors: false,
            auth: AuthConfig::default(),
            gitlab: GitLabConfig::default(),
        }
    }
}

/// Values supplied by flags or environment variables. `None` leaves the
/// file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub poll_interval: Option<Duration>,
    pub bind_address: Option<String>,
    pub cors: Option<bool>,
    pub jwt_algorithm: Option<String>,
    pub jwt_secret: Option<String>,
    pub gitlab_base_url: Option<String>,
    pub gitlab_token: Option<String>,
    pub gitlab_api_path: Option<String>,
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: ServerOverrides) {
        if let Some(interval) = overrides.poll_interval {
            self.poll_interval = interval;
        }
        if let Some(addr) = overrides.bind_address {
            self.bind_address = addr;
        }
        if let Some(cors) = overrides.cors {
            self.cors = cors;
        }
        if let Some(algorithm) = overrides.jwt_algorithm {
            self.auth.algorithm = algorithm;
        }
        if let Some(secret) = overrides.jwt_secret.filter(|s| !s.is_empty()) {
            self.auth.secret = Some(secret);
        }
        if let Some(url) = overrides.gitlab_base_url {
            self.gitlab.base_url = Some(url);
        }
        if let Some(token) = overrides.gitlab_token {
            self.gitlab.token = Some(token);
        }
        if let Some(path) = overrides.gitlab_api_path {
            self.gitlab.api_path = path;
        }
    }

    /// The configured signing algorithm. Only HMAC algorithms can be
    /// verified against a shared secret.
    pub fn signing_algorithm(&self) -> Result<Algorithm, ConfigError> {
        parse_algorithm(&self.auth.algorithm)
    }

    /// Check everything the server needs before it starts serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.gitlab.base_url.as_deref().unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                name: "GITLAB_API_BASE_URL",
            });
        }
        let token = self.gitlab.token.as_deref().unwrap_or_default();
        if token.trim().is_empty() {
            return Err(ConfigError::Missing {
                name: "GITLAB_API_TOKEN",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.signing_algorithm()?;
        Ok(())
    }
}

/// Parse an HMAC algorithm name (case-insensitive).
pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(ConfigError::UnsupportedAlgorithm(name.to_string())),
    }
}

/// Settings for a watch/pull client of the status server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: Option<u16>,
    pub tls: bool,
    pub token: Option<String>,
    pub backoff: BackoffConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            tls: false,
            token: None,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Parse a Go-style duration such as `500ms`, `10s`, `1m30s` or `2h`.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        message: message.to_string(),
    };

    let input = value.trim();
    if input.is_empty() {
        return Err(invalid("empty duration"));
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = Duration::ZERO;
    let mut rest = input;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !is_number(c))
            .ok_or_else(|| invalid("missing unit"))?;
        if number_end == 0 {
            return Err(invalid("expected a number"));
        }
        let number: f64 = rest[..number_end]
            .parse()
            .map_err(|_| invalid("invalid number"))?;

        let after = &rest[number_end..];
        let unit_end = after.find(is_number).unwrap_or(after.len());
        let nanos_per_unit = match &after[..unit_end] {
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid("unknown unit, expected ms, s, m or h")),
        };

        let nanos = (number * nanos_per_unit).round();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Err(invalid("duration out of range"));
        }
        total = total
            .checked_add(Duration::from_nanos(nanos as u64))
            .ok_or_else(|| invalid("duration out of range"))?;
        rest = &after[unit_end..];
    }

    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{}ms", duration.as_millis()))
}
