//! Error types for chordfs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Network Errors ===
    #[error("Transport error: {0}")]
    Transport(String),

    // === Replica Errors ===
    #[error("No replica available for file: {filename}")]
    NoReplicaAvailable { filename: String },

    #[error("Not found: {0}")]
    NotFound(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Encoding Errors ===
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Did a remote call fail (unreachable peer, unknown node, bad response)?
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::NoReplicaAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
