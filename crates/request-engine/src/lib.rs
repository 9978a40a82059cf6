//! Resilient request engine for a rate-limited, OAuth-protected REST API
//!
//! Turns "call endpoint X" into an authenticated, retried, decoded result.
//! Resource-specific methods sit on top of `RequestExecutor::execute` and are
//! not part of this crate.
//!
//! Call flow:
//! 1. `RequestExecutor::execute` builds a `RequestDescriptor` for the call
//! 2. Each attempt asks `oauth_session::TokenManager` for a live credential
//! 3. The `Transport` dispatches exactly one HTTP request
//! 4. `shape` decodes the body; 2xx bodies become the requested `ResultShape`
//! 5. `classify` turns failures into a `ClassifiedError`
//! 6. `retry` decides whether a rate-limited attempt is re-driven

pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod request;
pub mod retry;
pub mod shape;
pub mod transport;

pub use config::{ApiConfig, Config, RetryConfig};
pub use error::{ClassifiedError, ErrorKind};
pub use executor::{ExecutorSettings, RequestExecutor};
pub use request::{RequestDescriptor, RequestOptions, ResultShape};
pub use retry::{RetryDecision, RetryPolicy, RetryState, parse_retry_after, should_retry};
pub use shape::{FullResponse, NextPage, Shaped, has_more, sync_token};
pub use transport::{
    RawResponse, RequestEcho, ReqwestTransport, Transport, TransportFailure, TransportRequest,
};

pub use reqwest::Method;
