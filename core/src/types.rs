//! Logical request and outcome types.
//!
//! # Design
//! Whether a call goes out as JSON or multipart is decided when the caller
//! builds the `RequestBody`, not inferred from a field name. Payloads stay as
//! `serde_json::Value`; per-resource DTOs live with the caller and are
//! recovered through `ApiResponse::json`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Query parameters. Ordered so the emitted URL is deterministic.
pub type Query = BTreeMap<String, String>;

/// Result of one API call.
pub type Outcome = Result<ApiResponse, ApiError>;

/// A file to upload as part of a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart {
        fields: Map<String, Value>,
        attachments: Vec<Attachment>,
    },
}

impl RequestBody {
    pub fn json<T: Serialize>(payload: &T) -> Result<Self, ApiError> {
        serde_json::to_value(payload)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// `payload` must serialize to a JSON object; its members become form fields.
    pub fn multipart<T: Serialize>(
        payload: &T,
        attachments: Vec<Attachment>,
    ) -> Result<Self, ApiError> {
        match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => Ok(RequestBody::Multipart {
                fields,
                attachments,
            }),
            Ok(other) => Err(ApiError::Serialization(format!(
                "multipart fields must be a JSON object, got {other}"
            ))),
            Err(e) => Err(ApiError::Serialization(e.to_string())),
        }
    }
}

/// One logical API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Query,
    /// Sent verbatim as the `Authorization` header.
    pub auth: String,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Query::new(),
            auth: auth.into(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Rate-limit counters Freshdesk reports on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimit {
    pub total: Option<u32>,
    pub remaining: Option<u32>,
    pub used_current_request: Option<u32>,
}

/// Successful outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Parsed JSON payload. `Value::Null` for 204 and for empty bodies.
    pub body: Value,
    /// False when the response carried a `Link` header.
    pub is_last_page: bool,
    /// Target of the `rel="next"` link, if any.
    pub next_page: Option<String>,
    pub request_id: Option<String>,
    pub rate_limit: Option<RateLimit>,
}

impl ApiResponse {
    /// Deserialize the payload into a caller-defined type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        T::deserialize(&self.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}
