//! Error types for the Freshdesk request translator.
//!
//! # Design
//! When the server answered, the failure carries a `ProtocolError` with the
//! status, raw body, API target and upstream request id. `NotFound` gets its
//! own variant because callers routinely branch on "the entity does not
//! exist"; every other unexpected status (409 included) lands in
//! `UnexpectedStatus`. Failures before a response exists (connection, TLS,
//! timeout) are wrapped as `Transport` / `Timeout`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::HttpResponse;

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// A non-success answer from the Freshdesk API. Immutable once built.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{api_target} returned HTTP {status}: {message}")]
pub struct ProtocolError {
    message: String,
    body: Value,
    raw_body: String,
    status: u16,
    api_target: String,
    request_id: Option<String>,
    retry_after: Option<Duration>,
}

impl ProtocolError {
    pub(crate) fn from_response(
        message: String,
        api_target: &str,
        response: &HttpResponse,
        body: Value,
    ) -> Self {
        Self {
            message,
            body,
            raw_body: response.body.clone(),
            status: response.status,
            api_target: api_target.to_owned(),
            request_id: response.header(REQUEST_ID_HEADER).map(str::to_owned),
            retry_after: response
                .header(RETRY_AFTER_HEADER)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Parsed response body, `Value::Null` when it was empty or not JSON.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Response body exactly as received, kept for bodies that are not JSON.
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// `"<METHOD> <path>"` of the failed call.
    pub fn api_target(&self) -> &str {
        &self.api_target
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Delay suggested by `Retry-After`, typically on 429.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Field-level validation errors from the `errors` array of the body.
    pub fn field_errors(&self) -> Vec<FieldError> {
        self.body
            .get("errors")
            .and_then(|errors| Vec::<FieldError>::deserialize(errors).ok())
            .unwrap_or_default()
    }
}

/// One entry of a Freshdesk validation error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Errors produced by the translator. Every call returns exactly one outcome;
/// none of these are raised as panics.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404, whatever the body said.
    #[error(transparent)]
    NotFound(ProtocolError),

    /// The server returned any status other than 200, 201, 204 or 404.
    #[error(transparent)]
    UnexpectedStatus(ProtocolError),

    /// No response was received: connection refused, DNS, TLS and similar.
    #[error("request to {api_target} failed: {source}")]
    Transport {
        api_target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configured timeout elapsed before the call completed.
    #[error("request to {api_target} timed out after {timeout_ms} ms")]
    Timeout { api_target: String, timeout_ms: u64 },

    /// The request could not be assembled (bad URL, header value, MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The payload did not match the type the caller asked for.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    pub fn transport(
        api_target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ApiError::Transport {
            api_target: api_target.into(),
            source: source.into(),
        }
    }

    /// The server's answer, when there was one.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            ApiError::NotFound(err) | ApiError::UnexpectedStatus(err) => Some(err),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.protocol().map(ProtocolError::status)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.protocol().and_then(ProtocolError::request_id)
    }
}
