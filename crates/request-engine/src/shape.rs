//! Response shaping
//!
//! Decodes a raw response body and cuts it down to the requested
//! `ResultShape`. Each shape is a pure function of the decoded body; nothing
//! here looks at pagination or sync metadata beyond handing it through.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClassifiedError, ErrorKind};
use crate::request::ResultShape;
use crate::transport::{RawResponse, RequestEcho, TransportRequest};

/// Everything about a response, for callers that asked for `ResultShape::Full`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullResponse {
    pub status: u16,
    pub reason: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub raw_body: String,
    pub request: RequestEcho,
}

/// A shaped successful result.
#[derive(Debug, Clone, PartialEq)]
pub enum Shaped {
    Full(Box<FullResponse>),
    Normal(Value),
    Data(Value),
}

impl Shaped {
    /// The JSON value the shape selected. For `Full` this is the decoded body.
    pub fn value(&self) -> &Value {
        match self {
            Shaped::Full(full) => &full.body,
            Shaped::Normal(value) | Shaped::Data(value) => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Shaped::Full(full) => full.body,
            Shaped::Normal(value) | Shaped::Data(value) => value,
        }
    }

    pub fn into_full(self) -> Option<FullResponse> {
        match self {
            Shaped::Full(full) => Some(*full),
            _ => None,
        }
    }
}

/// Parse a response body into a JSON document.
///
/// Only objects and arrays count as documents. Anything else, including an
/// empty body, is `InvalidResponse` whatever the status code.
pub fn decode_body(response: &RawResponse) -> Result<Value, ClassifiedError> {
    let invalid = |detail: String| {
        ClassifiedError::new(
            ErrorKind::InvalidResponse,
            format!("{} {}: {detail}", response.status, response.reason),
        )
        .with_status(response.status)
    };

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| invalid(format!("response body is not valid JSON: {e}")))?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        other => Err(invalid(format!(
            "response body is not a JSON document: {}",
            json_type(&other)
        ))),
    }
}

/// Cut a decoded 2xx body down to `requested`.
pub fn shape(
    response: RawResponse,
    body: Value,
    requested: ResultShape,
    request: &TransportRequest,
) -> Shaped {
    match requested {
        ResultShape::Full => Shaped::Full(Box::new(shape_full(response, body, request.sanitized()))),
        ResultShape::Normal => Shaped::Normal(shape_normal(body)),
        ResultShape::Data => Shaped::Data(shape_data(body)),
    }
}

pub fn shape_full(response: RawResponse, body: Value, request: RequestEcho) -> FullResponse {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &response.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    FullResponse {
        status: response.status,
        reason: response.reason,
        headers,
        body,
        raw_body: response.body,
        request,
    }
}

pub fn shape_normal(body: Value) -> Value {
    body
}

/// The top-level `data` value, or the whole body when there is none.
pub fn shape_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Pagination cursor from a `Normal`-shaped listing body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NextPage {
    pub offset: Option<String>,
    pub path: Option<String>,
    pub uri: Option<String>,
}

impl NextPage {
    /// `None` when the body has no `next_page`, or it is `null` (last page).
    pub fn from_body(body: &Value) -> Option<Self> {
        let next = body.get("next_page")?;
        if next.is_null() {
            return None;
        }
        serde_json::from_value(next.clone()).ok()
    }
}

/// The `sync` token of an events response.
pub fn sync_token(body: &Value) -> Option<&str> {
    body.get("sync").and_then(Value::as_str)
}

/// Whether an events response says more events are waiting.
pub fn has_more(body: &Value) -> bool {
    body.get("has_more").and_then(Value::as_bool).unwrap_or(false)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
