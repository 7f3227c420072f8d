//! Error types for segkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Store Errors ===
    #[error("record does not exist: {0}")]
    NotFound(String),

    #[error("data integrity check failed: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("corrupted record: {0}")]
    Corrupted(String),

    #[error("store is closed")]
    Closed,

    // === Balancer Errors ===
    #[error("No healthy servers available")]
    NoHealthyBackends,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    // === HTTP Errors ===
    #[error("bad request: {0}")]
    BadRequest(String),

    // === Config Errors ===
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::NoHealthyBackends | Error::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upstream(e.to_string())
    }
}
