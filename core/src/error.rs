//! Error types for the movies API client.
//!
//! # Design
//! Every operation fails with a single `ClientError`. The variants keep the
//! diagnostic detail (status code, server body, transport message), while
//! `ClientError::kind` collapses them into the two classes callers usually
//! care about: the server answered with a non-2xx status, or no usable
//! response was obtained at all.

use thiserror::Error;

/// Coarse classification of a `ClientError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server responded with a non-2xx status.
    Server,
    /// No well-formed, decodable response was obtained.
    Transport,
}

/// Errors returned by `MoviesClient` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server returned a non-2xx status. `message` is the response body
    /// when non-empty, otherwise the status reason phrase.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The request never produced a complete response: connection refused,
    /// timeout, premature close or garbled bytes.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A 2xx response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Build a `Server` error from a status code and the raw response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            ureq::http::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}"))
        } else {
            body.to_string()
        };
        ClientError::Server { status, message }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Server { .. } => ErrorKind::Server,
            ClientError::Transport(_)
            | ClientError::Deserialization(_)
            | ClientError::Serialization(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
