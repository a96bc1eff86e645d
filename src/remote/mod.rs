//! Client for the remote AI-application backend.

mod client;
pub mod precision;

pub use client::{RemoteClient, RemoteConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout(_) | RemoteError::Connect(_) => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(err.to_string())
        } else if err.is_connect() {
            RemoteError::Connect(err.to_string())
        } else if err.is_builder() {
            RemoteError::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(RemoteError::Timeout("t".into()).is_transient());
        assert!(RemoteError::Connect("c".into()).is_transient());
        assert!(
            RemoteError::Status {
                status: 503,
                reason: "Service Unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !RemoteError::Status {
                status: 404,
                reason: "Not Found".into()
            }
            .is_transient()
        );
        assert!(!RemoteError::Decode("bad json".into()).is_transient());
    }
}
