//! Error classification
//!
//! Maps each way an attempt can fail onto exactly one `ErrorKind`. Bodies
//! are decoded before classification, so a malformed body has already become
//! `InvalidResponse` by the time a status is looked at here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::error::{ClassifiedError, ErrorKind};
use crate::retry::parse_retry_after;
use crate::transport::{RawResponse, TransportFailure, TransportRequest};

pub const TOO_MANY_REQUESTS: u16 = 429;

/// Classify a decoded non-2xx response.
///
/// `now` anchors HTTP-date `Retry-After` values.
pub fn status_error(
    response: &RawResponse,
    body: Value,
    request: &TransportRequest,
    now: DateTime<Utc>,
) -> ClassifiedError {
    let message = api_message(response, &body, request);

    if response.status == TOO_MANY_REQUESTS {
        let mut error = ClassifiedError::new(ErrorKind::RateLimited, message)
            .with_status(response.status)
            .with_payload(body);
        if let Some(delay) = response
            .header("retry-after")
            .and_then(|value| parse_retry_after(value, now))
        {
            error = error.with_retry_after(delay);
        }
        return error;
    }

    ClassifiedError::new(ErrorKind::ApiError, message)
        .with_status(response.status)
        .with_payload(body)
}

/// Classify a request that produced no response.
pub fn transport_failure(failure: TransportFailure) -> ClassifiedError {
    let kind = match failure {
        TransportFailure::Timeout(_) => ErrorKind::Timeout,
        TransportFailure::Network(_) => ErrorKind::TransportError,
    };
    ClassifiedError::new(kind, failure.to_string()).with_source(failure)
}

/// Classify a session that could not produce a credential.
pub fn credential_failure(error: oauth_session::Error) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::CredentialInvalid, error.to_string()).with_source(error)
}

/// The caller's deadline for the whole call elapsed.
pub fn deadline_elapsed(deadline: Duration, method: &Method, url: &Url) -> ClassifiedError {
    ClassifiedError::new(
        ErrorKind::Timeout,
        format!("request did not complete within {deadline:?} [{method} {url}]"),
    )
}

/// `"{status} {reason}: {message} (help: {help}) [{METHOD} {uri}]"`, with the
/// parts the API did not send left out.
fn api_message(response: &RawResponse, body: &Value, request: &TransportRequest) -> String {
    let mut message = format!("{} {}", response.status, response.reason);

    let errors = body
        .get("errors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let texts: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect();
    if !texts.is_empty() {
        message.push_str(": ");
        message.push_str(&texts.join("; "));
    }

    if let Some(help) = errors
        .iter()
        .find_map(|e| e.get("help").and_then(Value::as_str))
    {
        message.push_str(&format!(" (help: {help})"));
    }
    if let Some(phrase) = errors
        .iter()
        .find_map(|e| e.get("phrase").and_then(Value::as_str))
    {
        message.push_str(&format!(" (phrase: {phrase})"));
    }

    message.push_str(&format!(" [{} {}]", request.method, request.url));
    message
}
