//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! translator builds `HttpRequest` values and classifies `HttpResponse`
//! values without touching the network; a transport (the bundled reqwest one,
//! or anything the caller supplies) performs the actual I/O in between.
//!
//! All fields use owned types (`String`, `Vec`) so values can be handed to
//! any executor without lifetime concerns.

use std::fmt;

use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Encoded request body.
///
/// `Multipart` carries its parts unencoded: the executor picks the boundary
/// and emits the matching `multipart/form-data` content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    Json(String),
    Multipart(Vec<FormPart>),
}

/// An HTTP request described as plain data.
///
/// `url` already carries the encoded query string.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `"<METHOD> <path>"`, used to identify the call in logs and errors.
    pub fn api_target(&self) -> String {
        let path = Url::parse(&self.url)
            .map(|url| url.path().to_owned())
            .unwrap_or_else(|_| self.url.clone());
        format!("{} {path}", self.method)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the executor after running an `HttpRequest`, then passed
/// to `classify` for interpretation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("X-Request-Id".to_string(), "abc".to_string())],
            body: String::new(),
        };
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.header("link"), None);
    }

    #[test]
    fn api_target_uses_path_without_query() {
        let request = HttpRequest {
            method: HttpMethod::Delete,
            url: "https://acme.freshdesk.com/api/v2/tickets/7?force=true".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(request.api_target(), "DELETE /api/v2/tickets/7");
    }
}
