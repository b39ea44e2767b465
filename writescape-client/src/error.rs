//! Client error type.

use http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the backend client, session storage and realtime channel.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },
    /// The backend refused the payload and listed the reasons.
    #[error("backend rejected the request: {}", .0.join("; "))]
    Rejected(Vec<String>),
    /// A looked-up resource does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// The current user may not perform the action.
    #[error("permission denied: {0}")]
    Permission(String),
    /// The action needs a logged-in session.
    #[error("not logged in")]
    NotLoggedIn,
    /// The request was cancelled before it resolved.
    #[error("request cancelled")]
    Cancelled,
    /// A payload did not match the expected shape.
    #[error("invalid payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// The persisted session could not be read or written.
    #[error("session storage error at {path}: {source}")]
    Storage {
        /// Storage file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The realtime connection failed.
    #[error("realtime channel error: {0}")]
    Realtime(String),
    /// An endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Coarse classification that decides how a failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Field-local problems reported by the backend.
    Validation,
    /// Dedicated "not found" outcome.
    NotFound,
    /// Redirect away with a flash message.
    Permission,
    /// Logged for diagnostics only.
    Transport,
    /// Superseded or torn down; never shown.
    Cancelled,
    /// The session is missing or expired.
    Session,
    /// Local persistence failed.
    Storage,
}

impl ClientError {
    /// How this error should be handled by callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Permission(_) => ErrorKind::Permission,
            Self::NotLoggedIn => ErrorKind::Session,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Transport(_)
            | Self::Status { .. }
            | Self::Decode(_)
            | Self::Realtime(_)
            | Self::Url(_) => ErrorKind::Transport,
        }
    }

    /// Whether the error is only logged and never shown to the user.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Cancelled)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Realtime(err.to_string())
    }
}
