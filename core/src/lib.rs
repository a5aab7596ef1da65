//! Request translator for the Freshdesk v2 REST API.
//!
//! # Overview
//! Turns a logical API call (method, URL, query, auth, optional JSON or
//! multipart body) into exactly one HTTP request, and the answer into a
//! uniform `Outcome`: the parsed payload with pagination, request-id and
//! rate-limit metadata, or a typed `ApiError`.
//!
//! # Design
//! - `build_request` and `classify` are pure and work on plain data
//!   (`HttpRequest` / `HttpResponse`), so a host can run the I/O itself.
//! - `FreshdeskClient::send` composes them around an `HttpTransport`,
//!   reqwest by default.
//! - No retries, no shared mutable state; each call stands alone.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
mod form;
pub mod http;
pub mod transport;
pub mod types;

pub use auth::{basic_auth, basic_auth_with_password};
pub use client::{build_request, classify, FreshdeskClient};
pub use config::ClientConfig;
pub use error::{ApiError, FieldError, ProtocolError};
pub use http::{FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{ApiRequest, ApiResponse, Attachment, Outcome, Query, RateLimit, RequestBody};
