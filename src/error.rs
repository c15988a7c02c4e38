//! Error types shared across the session tracker and its collaborators.

use std::sync::Arc;
use thiserror::Error;

/// Errors raised by an authentication context
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authentication token is available")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Request to auth service failed: {0}")]
    Http(String),

    #[error("Auth service rejected the request: {status} - {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Http(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidToken(err.to_string())
    }
}

/// Outcome of a failed renewal, handed to every caller awaiting it.
///
/// Cloneable so that a single refresh failure can be observed by all
/// callers sharing the in-flight attempt.
#[derive(Error, Debug, Clone)]
#[error("Session renewal failed: {0}")]
pub struct RenewalError(Arc<str>);

impl RenewalError {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        RenewalError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<AuthError> for RenewalError {
    fn from(err: AuthError) -> Self {
        RenewalError(err.to_string().into())
    }
}

impl From<tokio::task::JoinError> for RenewalError {
    fn from(err: tokio::task::JoinError) -> Self {
        RenewalError(format!("refresh task ended unexpectedly: {}", err).into())
    }
}

/// Errors from a key-value store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage is unavailable: {0}")]
    Unavailable(String),
}
