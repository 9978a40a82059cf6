//! Closed error taxonomy surfaced by the engine

use std::fmt;
use std::time::Duration;

/// Every failure the engine can return falls into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Body was not a JSON object or array. Never retried.
    InvalidResponse,
    /// HTTP 429. Retried up to the configured maximum.
    RateLimited,
    /// The session cannot produce a credential until a new one is installed.
    CredentialInvalid,
    /// Any other non-2xx response.
    ApiError,
    /// No usable response from the network.
    TransportError,
    /// The caller's deadline elapsed.
    Timeout,
}

impl ErrorKind {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::CredentialInvalid => "credential_invalid",
            ErrorKind::ApiError => "api_error",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A classified failure, built once and then only read.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    payload: Option<serde_json::Value>,
    retry_after: Option<Duration>,
    #[source]
    source: Option<BoxError>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            payload: None,
            retry_after: None,
            source: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the response that caused the failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Decoded API error body, if the server sent one.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// For `RateLimited`: the server-advised delay, or the delay the engine
    /// last computed when retries ran out.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }
}
