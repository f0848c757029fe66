//! Error types for the saved-search SDK

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the SDK
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the SDK
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connection refused, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured service address could not be turned into a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A response body was not the JSON we expected
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid or incomplete settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Login failed or the session key was rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested entity does not exist
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Any other non-success status returned by the service
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// An entity's content is missing a field the caller required
    #[error("{entity} has no field '{field}'")]
    MissingField { entity: String, field: String },

    /// A successful response that did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A wait finished without its predicate ever holding
    #[error("timed out after {attempts} attempts ({elapsed:?})")]
    WaitTimeout { attempts: u32, elapsed: Duration },
}

impl Error {
    /// True when the service reported the entity as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
