//! Error types for OAuth session operations

use std::time::Duration;

/// Errors from OAuth session operations.
///
/// `Clone` because one refresh outcome is handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential invalid: {0}")]
    CredentialInvalid(String),

    #[error("token refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("OAuth configuration error: {0}")]
    Config(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
