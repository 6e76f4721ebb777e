//! Error taxonomy shared by the API clients, the engine, and configuration.

use thiserror::Error;

/// Failures of a single outbound call to Testim or Qase.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The call did not complete within its bound.
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: &'static str },

    /// Connection, TLS, or protocol failure.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The body could not be decoded into the expected shape.
    #[error("unexpected response body from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The body decoded but lacks a field the caller needs.
    #[error("response from {endpoint} is missing `{field}`")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },
}

impl SyncError {
    /// Classify a reqwest failure, separating timeouts from other transport errors.
    pub fn from_reqwest(endpoint: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout { endpoint }
        } else {
            SyncError::Http {
                endpoint,
                source: err,
            }
        }
    }
}

/// Startup configuration problems. Fatal before any scheduling happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the environment variable '{0}' is missing, please set it before start")]
    MissingToken(&'static str),

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("a preview window of {0} hours is out of range")]
    PreviewWindow(u64),

    #[error("invalid UTC offset of {0} minutes")]
    InvalidOffset(i32),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
