//! Error types
//!
//! Every controller operation returns one of these instead of panicking.
//! Nothing here is fatal to the process; callers decide whether to surface,
//! retry, or ignore.

use std::fmt;
use thiserror::Error;

/// Failure category of a single REST call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request never reached the server or the response never came back
    Network,
    /// HTTP 401 or 403
    Unauthorized,
    /// Any other non-2xx status
    ServerError,
    /// 2xx response whose body is not valid JSON or has the wrong shape
    Malformed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::ServerError => "server_error",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure of a REST call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
pub struct RequestError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    pub fn unauthorized(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ServerError,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Malformed,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-2xx status. 401 and 403 both mean the credential is
    /// no good.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::unauthorized(status, message),
            _ => Self::server(status, message),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        Self::malformed(e.to_string())
    }
}

/// Session-level errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Credential must not be empty")]
    EmptyCredential,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Login response did not contain a token")]
    MissingToken,

    #[error(transparent)]
    Request(#[from] RequestError),
}
