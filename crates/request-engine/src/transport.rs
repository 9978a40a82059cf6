//! HTTP transport seam
//!
//! The executor never talks to `reqwest` directly: it hands a fully built
//! `TransportRequest` to a `Transport` and gets back either the raw response
//! or a `TransportFailure`. Tests substitute a scripted transport.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::REDACTED;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;

/// One outbound HTTP request, credential included.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl TransportRequest {
    /// Copy of the request safe to log or hand back to callers.
    ///
    /// The `Authorization` value is replaced by a redaction marker; the
    /// request itself is not touched.
    pub fn sanitized(&self) -> RequestEcho {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if name == AUTHORIZATION {
                    REDACTED.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.as_str().to_string(), value)
            })
            .collect();

        RequestEcho {
            method: self.method.to_string(),
            url: self.url.to_string(),
            headers,
            body: self.body.clone(),
        }
    }
}

/// Sanitized echo of a request, as returned in `ResultShape::Full`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEcho {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Whatever came back over the wire, undecoded.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// No usable response was received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Dispatches exactly one HTTP request per call.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, TransportFailure>> + Send + 'a>>;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client with a per-request timeout and optional user agent.
    pub fn build(timeout: Duration, user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(Self::new(builder.build()?))
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, TransportFailure>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone());
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(failure)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(failure)?;

            Ok(RawResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            })
        })
    }
}

fn failure(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout(e.to_string())
    } else {
        TransportFailure::Network(e.to_string())
    }
}
