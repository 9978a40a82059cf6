//! Request executor
//!
//! One logical call = one `RequestDescriptor`, any number of attempts. Each
//! attempt fetches a live credential, dispatches exactly one transport
//! request and either shapes the response or classifies the failure. Only
//! rate-limited attempts are re-driven, and only within the caller's deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oauth_session::TokenManager;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::classify;
use crate::config::Config;
use crate::error::{ClassifiedError, ErrorKind};
use crate::request::{RequestDescriptor, RequestOptions, ResultShape};
use crate::retry::{RetryDecision, RetryPolicy, should_retry};
use crate::shape::{self, Shaped};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Executor-wide settings; per-call options can only shorten or lengthen
/// the deadline.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub base_url: Url,
    /// Deadline for one logical call, retry waits included
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ExecutorSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Entry point for every API call.
///
/// Cheap to clone; clones share the transport and the session.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    tokens: TokenManager,
    settings: Arc<ExecutorSettings>,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenManager,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            transport,
            tokens,
            settings: Arc::new(settings),
        }
    }

    /// Build an executor over a `reqwest` transport from loaded config.
    pub fn from_config(config: &Config, tokens: TokenManager) -> common::Result<Self> {
        let transport = ReqwestTransport::build(config.timeout(), config.api.user_agent.as_deref())
            .map_err(|e| common::Error::Config(format!("failed to build HTTP client: {e}")))?;
        let settings = ExecutorSettings::new(config.base_url()?)
            .with_timeout(config.timeout())
            .with_retry(config.retry_policy());
        Ok(Self::new(Arc::new(transport), tokens, settings))
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run one logical call and return the requested shape.
    ///
    /// `path` is relative to the configured base URL. Fails with a
    /// `ClassifiedError` once the failure is not retryable, retries run out,
    /// or the deadline passes.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
        shape: ResultShape,
    ) -> Result<Shaped, ClassifiedError> {
        let method_label = method.to_string();
        let result = match RequestDescriptor::new(&self.settings.base_url, method, path, options, shape)
        {
            Ok(descriptor) => {
                let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
                self.run(&descriptor, &request_id).await
            }
            Err(e) => {
                warn!(method = %method_label, path, error = %e, "rejected request");
                Err(e)
            }
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().label(),
        };
        crate::metrics::record_request(&method_label, outcome);
        result
    }

    /// `execute` with the `Data` shape, deserialized into `T`.
    pub async fn data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClassifiedError> {
        let value = self
            .execute(method, path, options, ResultShape::Data)
            .await?
            .into_value();
        serde_json::from_value(value).map_err(|e| {
            ClassifiedError::new(
                ErrorKind::InvalidResponse,
                format!("response data does not match the expected type: {e}"),
            )
            .with_source(e)
        })
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, ClassifiedError> {
        self.data_value(Method::GET, path, options).await
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Value, ClassifiedError> {
        self.data_value(Method::POST, path, options).await
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<Value, ClassifiedError> {
        self.data_value(Method::PUT, path, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value, ClassifiedError> {
        self.data_value(Method::DELETE, path, options).await
    }

    async fn data_value(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, ClassifiedError> {
        Ok(self
            .execute(method, path, options, ResultShape::Data)
            .await?
            .into_value())
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %descriptor.method(), path = %descriptor.path()))]
    async fn run(
        &self,
        descriptor: &RequestDescriptor,
        request_id: &str,
    ) -> Result<Shaped, ClassifiedError> {
        let deadline = descriptor.timeout().unwrap_or(self.settings.timeout);
        match tokio::time::timeout(deadline, self.attempts(descriptor)).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout_ms = deadline.as_millis() as u64, "request deadline elapsed");
                Err(classify::deadline_elapsed(
                    deadline,
                    descriptor.method(),
                    descriptor.url(),
                ))
            }
        }
    }

    async fn attempts(&self, descriptor: &RequestDescriptor) -> Result<Shaped, ClassifiedError> {
        let mut state = self.settings.retry.start();
        loop {
            let attempt = state.attempt();
            info!(attempt, "request start");

            let err = match self.attempt(descriptor).await {
                Ok(shaped) => return Ok(shaped),
                Err(err) => err,
            };

            match should_retry(&err, &state) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        status = err.status(),
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    crate::metrics::record_rate_limit_retry();
                    tokio::time::sleep(delay).await;
                    state.record_retry();
                }
                RetryDecision::Exhausted(delay) => {
                    error!(
                        attempt,
                        status = err.status(),
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, retries exhausted"
                    );
                    return Err(err.with_retry_after(delay));
                }
                RetryDecision::NotRetryable => {
                    error!(
                        attempt,
                        kind = %err.kind(),
                        status = err.status(),
                        error = %err,
                        "request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, descriptor: &RequestDescriptor) -> Result<Shaped, ClassifiedError> {
        let request = self.authorize(descriptor).await?;

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(classify::transport_failure)?;
        let body = shape::decode_body(&response)?;

        if !response.is_success() {
            return Err(classify::status_error(&response, body, &request, Utc::now()));
        }

        info!(status = response.status, "request succeeded");
        Ok(shape::shape(response, body, descriptor.shape(), &request))
    }

    /// Build the outbound request with a fresh bearer credential.
    async fn authorize(&self, descriptor: &RequestDescriptor) -> Result<TransportRequest, ClassifiedError> {
        let credential = self
            .tokens
            .get_valid_credential()
            .await
            .map_err(classify::credential_failure)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in descriptor.headers() {
            let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!(header = %name, "skipping invalid header name");
                continue;
            };
            if header == AUTHORIZATION || header == ACCEPT {
                warn!(header = %header, "ignoring reserved header in request options");
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(header, value);
                }
                Err(_) => warn!(header = %name, "skipping invalid header value"),
            }
        }

        let mut bearer = HeaderValue::from_str(&credential.bearer_header()).map_err(|_| {
            ClassifiedError::new(
                ErrorKind::CredentialInvalid,
                "access token is not a valid header value",
            )
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        debug!(headers = headers.len(), "request authorized");

        Ok(TransportRequest {
            method: descriptor.method().clone(),
            url: descriptor.url().clone(),
            headers,
            body: descriptor.body().cloned(),
        })
    }
}
