//! Client error types.

use thiserror::Error;

/// Errors returned by [`crate::KamClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, timeout, or body decoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status and an error body.
    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The server answered with a body the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The base URL is unusable.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The server's error code, e.g. `validation_error`.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
