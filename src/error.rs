//! Error types and handling for Obolus
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for Obolus operations
pub type Result<T> = std::result::Result<T, ObolusError>;

/// Main error type for Obolus
#[derive(Debug, Error)]
pub enum ObolusError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Tariff API integration errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ObolusError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ObolusError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        ObolusError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ObolusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ObolusError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ObolusError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        ObolusError::Api {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ObolusError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ObolusError {
    fn from(err: std::io::Error) -> Self {
        ObolusError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ObolusError {
    fn from(err: serde_yaml::Error) -> Self {
        ObolusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ObolusError {
    fn from(err: serde_json::Error) -> Self {
        ObolusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ObolusError {
    fn from(err: reqwest::Error) -> Self {
        ObolusError::network(err.to_string())
    }
}

impl From<chrono::ParseError> for ObolusError {
    fn from(err: chrono::ParseError) -> Self {
        ObolusError::validation("datetime", &err.to_string())
    }
}

/// Failure taxonomy for a single tariff fetch.
///
/// The poll scheduler branches on these: `Unauthorized` and `NotFound` halt
/// polling for the affected tariff type until reconfiguration, `Transient`
/// retries with backoff within the cycle, `Malformed` waits for the next
/// regular tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials rejected by the API (HTTP 401/403)
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Tariff name or metering code unknown upstream (HTTP 404)
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Timeout, connection failure or server-side error (HTTP 5xx)
    #[error("Transient error: {message}")]
    Transient { message: String },

    /// Response body did not match the expected shape
    #[error("Malformed response: {message}")]
    Malformed { message: String },
}

impl FetchError {
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        FetchError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        FetchError::NotFound {
            message: message.into(),
        }
    }

    pub fn transient<S: Into<String>>(message: S) -> Self {
        FetchError::Transient {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        FetchError::Malformed {
            message: message.into(),
        }
    }

    /// Whether this failure halts polling for the tariff type
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchError::Unauthorized { .. } | FetchError::NotFound { .. }
        )
    }

    /// Whether this failure is worth retrying within the same cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    /// Map an HTTP status to the fetch taxonomy
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        use reqwest::StatusCode;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FetchError::Unauthorized { message }
            }
            StatusCode::NOT_FOUND => FetchError::NotFound { message },
            s if s.is_server_error() => FetchError::Transient { message },
            _ => FetchError::Malformed { message },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return FetchError::transient(err.to_string());
        }
        if let Some(status) = err.status() {
            return FetchError::from_status(status, err.to_string());
        }
        FetchError::transient(err.to_string())
    }
}

/// Schedule parsing failures.
///
/// A parse failure rejects the whole payload; partially valid schedules never
/// reach the cache.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload envelope is missing the slot list
    #[error("Payload has no slot list: {message}")]
    Envelope { message: String },

    /// A single slot is unusable (missing start, bad timestamp, no price)
    #[error("Slot {index}: {message}")]
    Slot { index: usize, message: String },

    /// Slots violate the ordering/non-overlap invariant
    #[error("Slot {index} overlaps or precedes its predecessor")]
    Overlap { index: usize },
}

impl ParseError {
    pub fn envelope<S: Into<String>>(message: S) -> Self {
        ParseError::Envelope {
            message: message.into(),
        }
    }

    pub fn slot<S: Into<String>>(index: usize, message: S) -> Self {
        ParseError::Slot {
            index,
            message: message.into(),
        }
    }
}

/// Fault kind recorded on a cache entry after a failed refresh.
///
/// This is the serializable face of `FetchError`/`ParseError` that the sensor
/// adapter exposes so misconfiguration is diagnosable without a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFault {
    Unauthorized,
    NotFound,
    Transient,
    Malformed,
    Parse,
}

impl FetchFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFault::Unauthorized => "unauthorized",
            FetchFault::NotFound => "not_found",
            FetchFault::Transient => "transient",
            FetchFault::Malformed => "malformed",
            FetchFault::Parse => "parse",
        }
    }
}

impl From<&FetchError> for FetchFault {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Unauthorized { .. } => FetchFault::Unauthorized,
            FetchError::NotFound { .. } => FetchFault::NotFound,
            FetchError::Transient { .. } => FetchFault::Transient,
            FetchError::Malformed { .. } => FetchFault::Malformed,
        }
    }
}
