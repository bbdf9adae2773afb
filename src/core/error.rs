// src/core/error.rs

//! Error taxonomy for the harvesting workflow.
//!
//! Each stage returns its own error type so the runner can decide how far a
//! failure reaches: a server, or a single (scan, format) pair.

use strum::Display;

use crate::core::models::ExportFormat;

/// Failure of a single network exchange with an appliance.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls failure: {0}")]
    Tls(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Failure to obtain a session token.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("wrong username or password")]
    Rejected,

    #[error("unexpected session response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure to retrieve the scan list.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("unexpected scan list response: {0}")]
    MalformedResponse(String),

    #[error("server answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The stage at which a (scan, format) export was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExportErrorKind {
    #[strum(to_string = "export request")]
    RequestFailed,
    #[strum(to_string = "status poll")]
    PollFailed,
    #[strum(to_string = "status poll (timed out)")]
    PollTimedOut,
    #[strum(to_string = "download")]
    DownloadFailed,
    #[strum(to_string = "export (cancelled)")]
    Cancelled,
}

/// Failure of one (scan, format) pair. Never escapes the pair's scope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failed for {format} report: {detail}")]
pub struct ExportError {
    pub kind: ExportErrorKind,
    pub format: ExportFormat,
    pub detail: String,
}

impl ExportError {
    pub fn new(kind: ExportErrorKind, format: ExportFormat, detail: impl Into<String>) -> Self {
        Self { kind, format, detail: detail.into() }
    }

    /// Maps a transport failure onto `kind`, except cancellation which keeps its own kind.
    pub fn from_transport(kind: ExportErrorKind, format: ExportFormat, err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::new(ExportErrorKind::Cancelled, format, err.to_string()),
            other => Self::new(kind, format, other.to_string()),
        }
    }
}

/// Why a whole server was abandoned.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    #[error("could not prepare connection: {0}")]
    Connect(TransportError),

    #[error("error logging in/getting token: {0}")]
    Auth(#[from] AuthError),

    #[error("error getting scan list: {0}")]
    Catalog(#[from] CatalogError),

    #[error("unexpected failure: {0}")]
    Unexpected(String),

    #[error("processing cancelled")]
    Cancelled,
}

impl ServerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ServerError::Cancelled
                | ServerError::Connect(TransportError::Cancelled)
                | ServerError::Auth(AuthError::Transport(TransportError::Cancelled))
                | ServerError::Catalog(CatalogError::Transport(TransportError::Cancelled))
        )
    }
}
