//! Per-call request description
//!
//! `RequestOptions` is what a caller hands to `RequestExecutor::execute`;
//! `RequestDescriptor` is the immutable, fully resolved form the executor
//! works from for the lifetime of one logical call.

use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::Value;

use crate::error::{ClassifiedError, ErrorKind};

/// How much of the response a caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// Status, headers, decoded and raw body, sanitized request echo
    Full,
    /// Decoded body as-is, including pagination/sync metadata
    Normal,
    /// The top-level `data` value, or the whole body when absent
    #[default]
    Data,
}

/// Query parameters, body, headers and timeout for one call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a query parameter. Setting an existing key replaces its value in
    /// place, so keys stay unique and keep their first-seen order.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Restrict returned fields (`opt_fields=a,b`).
    pub fn fields(self, fields: &[&str]) -> Self {
        self.query("opt_fields", fields.join(","))
    }

    /// Expand nested resources (`opt_expand=a,b`).
    pub fn expand(self, fields: &[&str]) -> Self {
        self.query("opt_expand", fields.join(","))
    }

    /// Ask the server for indented JSON.
    pub fn pretty(self) -> Self {
        self.query("opt_pretty", true)
    }

    pub fn limit(self, limit: u32) -> Self {
        self.query("limit", limit)
    }

    /// Resume a paginated listing from a `next_page.offset` cursor.
    pub fn offset(self, offset: impl Into<String>) -> Self {
        self.query("offset", offset.into())
    }

    /// JSON request body. Wrapped as `{"data": body}` unless it already has a
    /// top-level `data` key.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra request header. `Authorization` and `Accept` are managed by the
    /// engine and cannot be set here.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Deadline for the whole logical call, including retry waits.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Immutable description of one logical call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    url: Url,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    shape: ResultShape,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Resolve `path` against `base_url` and fold the options in.
    ///
    /// `path` must be relative: anything carrying a scheme or host is
    /// rejected before a request is made.
    pub fn new(
        base_url: &Url,
        method: Method,
        path: &str,
        options: RequestOptions,
        shape: ResultShape,
    ) -> Result<Self, ClassifiedError> {
        let target = path.split_once('?').map_or(path, |(target, _)| target);
        if target.contains("://") || target.starts_with("//") {
            return Err(ClassifiedError::new(
                ErrorKind::TransportError,
                format!("request path must be relative, got: {path}"),
            ));
        }

        let joined = format!(
            "{}/{}",
            base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| {
            ClassifiedError::new(
                ErrorKind::TransportError,
                format!("invalid request path {path}: {e}"),
            )
            .with_source(e)
        })?;
        if !options.query.is_empty() {
            let merged = merge_query(&url, &options.query);
            url.query_pairs_mut().clear().extend_pairs(merged);
        }

        Ok(Self {
            method,
            path: path.to_string(),
            url,
            body: options.body.map(wrap_data),
            headers: options.headers,
            shape,
            timeout: options.timeout,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Fold option pairs into the query already on `url` (e.g. a
/// `next_page.path`). An option replaces an existing key in place.
fn merge_query(url: &Url, options: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in options {
        match merged.iter().position(|(k, _)| k == key) {
            Some(index) => {
                merged[index].1 = value.clone();
                let mut seen = 0;
                merged.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => merged.push((key.clone(), value.clone())),
        }
    }
    merged
}

fn wrap_data(body: Value) -> Value {
    match body {
        Value::Object(ref map) if map.contains_key("data") => body,
        other => serde_json::json!({ "data": other }),
    }
}
