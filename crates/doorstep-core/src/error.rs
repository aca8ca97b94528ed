//! Error types for doorstep.

use thiserror::Error;

/// Result type alias using doorstep's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for doorstep operations.
///
/// Cache degradation deliberately has no variant here: a cache read or write
/// failure is logged by the caller and downgraded (treat all ids as missing,
/// skip the refresh), so retrieval never fails on the cache path.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed on either backing store (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input rejected before any backend call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Geocoding failed: no provider match, timeout, or transport error
    #[error("Geocoding error: {0}")]
    Geocode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Geocode(format!("provider timeout: {}", e))
        } else {
            Error::Request(e.to_string())
        }
    }
}
