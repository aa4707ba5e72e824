// ================================================================
// File: liveframe-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Secret file missing or unparseable, bad URLs in the client config.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Overlay error: {0}")]
    Overlay(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Configuration and authorization failures end the run; everything else
    /// is recovered locally by the component that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Auth(_) | Error::Cancelled(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUri(err.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
