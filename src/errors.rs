//! Typed error hierarchy for cistatus.
//!
//! Three top-level enums cover the three failure domains:
//! - `ConfigError` — invalid startup configuration (always fatal)
//! - `FetchError` — upstream CI fetch failures (always recovered by the fetch loop)
//! - `ClientError` — watch/pull client failures (recovered by the reconnect loop)

use thiserror::Error;

/// Errors raised while assembling or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },

    #[error("Invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    #[error("Unsupported signing algorithm '{0}'. Valid values: HS256, HS384, HS512")]
    UnsupportedAlgorithm(String),

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from a single fetch against the upstream CI server.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Unable to fetch {what}: {source}")]
    Context {
        what: String,
        #[source]
        source: Box<FetchError>,
    },

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Wrap this error with a description of what was being fetched.
    pub fn context(self, what: impl Into<String>) -> Self {
        FetchError::Context {
            what: what.into(),
            source: Box::new(self),
        }
    }
}

/// Errors from the status server clients.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Hostname must be set on the status client")]
    MissingHostname,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid summary frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Watch channel closed by server")]
    Closed,

    #[error("No frames from server for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    #[error("Summary consumer went away")]
    ConsumerGone,

    #[error("Gave up reconnecting after {elapsed:?}: {last_error}")]
    RetriesExhausted {
        elapsed: std::time::Duration,
        last_error: String,
    },
}
