//! The request translator.
//!
//! # Design
//! `FreshdeskClient` carries no mutable state between calls. A call is split
//! into `build_request` (logical request to plain `HttpRequest`), one
//! transport round-trip, and `classify` (plain response, or transport
//! failure, to `Outcome`). Callers doing their own I/O use the two halves
//! directly; `send` / `execute` compose them.

use std::sync::Arc;

use reqwest::header::HeaderValue;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, ProtocolError, REQUEST_ID_HEADER};
use crate::form::encode_form;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{ApiRequest, ApiResponse, Outcome, Query, RateLimit, RequestBody};

const NOT_FOUND_MESSAGE: &str = "The requested entity was not found";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Async client for the Freshdesk v2 API.
///
/// Cheap to clone; clones share the underlying connection pool. Calls made
/// concurrently from several tasks are independent of each other.
#[derive(Clone)]
pub struct FreshdeskClient {
    base_url: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for FreshdeskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshdeskClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FreshdeskClient {
    /// Client backed by `ReqwestTransport`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            transport,
        }
    }

    /// Join `path` onto the configured base URL. Without one, `path` is
    /// returned as is.
    pub fn endpoint(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{}", path.trim_start_matches('/')),
            None => path.to_string(),
        }
    }

    /// Issue one call and classify its result.
    pub async fn send(
        &self,
        method: HttpMethod,
        auth: &str,
        url: &str,
        query: &Query,
        body: Option<RequestBody>,
    ) -> Outcome {
        let request = ApiRequest {
            method,
            url: url.to_string(),
            query: query.clone(),
            auth: auth.to_string(),
            body,
        };
        self.execute(request).await
    }

    pub async fn execute(&self, request: ApiRequest) -> Outcome {
        let request = build_request(request)?;
        let api_target = request.api_target();
        let multipart = matches!(request.body, Some(HttpBody::Multipart(_)));
        debug!(target_call = %api_target, multipart, "dispatching freshdesk request");
        let result = self.transport.execute(request).await;
        classify(&api_target, result)
    }
}

/// Turn a logical request into a plain `HttpRequest`.
///
/// Sets `Authorization` always and `Content-Type: application/json` unless
/// the body is multipart. Query parameters are URL-encoded onto the target.
pub fn build_request(request: ApiRequest) -> Result<HttpRequest, ApiError> {
    let mut url = Url::parse(&request.url)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid URL {}: {e}", request.url)))?;
    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(request.query.iter());
    }

    HeaderValue::from_str(&request.auth).map_err(|_| {
        ApiError::InvalidRequest("authorization value contains invalid characters".to_string())
    })?;
    let mut headers = vec![("authorization".to_string(), request.auth)];

    let body = match request.body {
        Some(RequestBody::Multipart {
            fields,
            attachments,
        }) => Some(HttpBody::Multipart(encode_form(fields, attachments))),
        Some(RequestBody::Json(value)) => {
            headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
            let text = serde_json::to_string(&value)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
            Some(HttpBody::Json(text))
        }
        None => {
            headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
            None
        }
    };

    Ok(HttpRequest {
        method: request.method,
        url: url.into(),
        headers,
        body,
    })
}

/// Map a transport result onto the Freshdesk status contract.
///
/// Transport failures pass through unchanged so that every call, answered
/// or not, ends in this one place.
pub fn classify(api_target: &str, result: Result<HttpResponse, ApiError>) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            warn!(target_call = %api_target, error = %err, "freshdesk request failed before a response");
            return Err(err);
        }
    };

    debug!(
        target_call = %api_target,
        status = response.status,
        request_id = response.header(REQUEST_ID_HEADER).unwrap_or("-"),
        "freshdesk response received"
    );

    let body = parse_body(&response.body);
    match response.status {
        200 | 201 => Ok(success(&response, body)),
        204 => Ok(success(&response, Value::Null)),
        404 => Err(ApiError::NotFound(ProtocolError::from_response(
            NOT_FOUND_MESSAGE.to_string(),
            api_target,
            &response,
            body,
        ))),
        status => {
            let message = body
                .get("description")
                .and_then(Value::as_str)
                .map_or_else(|| format!("unexpected HTTP status {status}"), str::to_owned);
            Err(ApiError::UnexpectedStatus(ProtocolError::from_response(
                message, api_target, &response, body,
            )))
        }
    }
}

/// Empty or non-JSON bodies are tolerated as `Null`.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or(Value::Null)
}

fn success(response: &HttpResponse, body: Value) -> ApiResponse {
    let link = response.header("link");
    ApiResponse {
        body,
        is_last_page: link.is_none(),
        next_page: link.and_then(next_link),
        request_id: response.header(REQUEST_ID_HEADER).map(str::to_owned),
        rate_limit: rate_limit(response),
    }
}

/// Extract the URL of the `rel="next"` entry of a `Link` header.
///
/// Targets are located by their `<...>` delimiters first, since the URLs
/// themselves may contain commas.
fn next_link(header: &str) -> Option<String> {
    let mut rest = header;
    while let Some(start) = rest.find('<') {
        let (target, tail) = rest[start + 1..].split_once('>')?;
        let params = tail.find('<').map_or(tail, |end| &tail[..end]);
        if params.split(|c: char| c == ';' || c == ',').any(is_next_relation) {
            return Some(target.trim().to_string());
        }
        rest = tail;
    }
    None
}

fn is_next_relation(param: &str) -> bool {
    let Some((key, value)) = param.split_once('=') else {
        return false;
    };
    key.trim().eq_ignore_ascii_case("rel")
        && value
            .trim()
            .trim_matches('"')
            .split_ascii_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("next"))
}

fn rate_limit(response: &HttpResponse) -> Option<RateLimit> {
    let read = |name: &str| response.header(name).and_then(|v| v.trim().parse().ok());
    let limit = RateLimit {
        total: read("x-ratelimit-total"),
        remaining: read("x-ratelimit-remaining"),
        used_current_request: read("x-ratelimit-used-currentrequest"),
    };
    (limit != RateLimit::default()).then_some(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attachment;
    use serde_json::json;

    const URL: &str = "https://acme.freshdesk.com/api/v2/tickets";
    const TARGET: &str = "GET /api/v2/tickets";

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_json_request_sets_headers_and_body() {
        let req = build_request(
            ApiRequest::new(HttpMethod::Post, URL, "Basic abc")
                .with_body(RequestBody::Json(json!({"subject": "Help"}))),
        )
        .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, URL);
        assert_eq!(req.header("Authorization"), Some("Basic abc"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        let Some(HttpBody::Json(text)) = &req.body else {
            panic!("expected JSON body");
        };
        let sent: Value = serde_json::from_str(text).unwrap();
        assert_eq!(sent, json!({"subject": "Help"}));
    }

    #[test]
    fn build_without_body_still_declares_json() {
        let req = build_request(ApiRequest::new(HttpMethod::Get, URL, "Basic abc")).unwrap();
        assert!(req.body.is_none());
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn build_multipart_request_leaves_content_type_to_transport() {
        let body = RequestBody::multipart(
            &json!({"subject": "Logs", "tags": ["a", "b"]}),
            vec![Attachment::new("log.txt", b"hello".to_vec())],
        )
        .unwrap();
        let req =
            build_request(ApiRequest::new(HttpMethod::Post, URL, "Basic abc").with_body(body))
                .unwrap();
        assert_eq!(req.header("content-type"), None);
        let Some(HttpBody::Multipart(parts)) = &req.body else {
            panic!("expected multipart body");
        };
        let names: Vec<&str> = parts.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["subject", "tags[]", "tags[]", "attachments[]"]);
    }

    #[test]
    fn build_appends_encoded_query() {
        let req = build_request(
            ApiRequest::new(HttpMethod::Get, URL, "Basic abc")
                .with_query("page", "2")
                .with_query("query", "\"status:2\""),
        )
        .unwrap();
        assert_eq!(req.url, format!("{URL}?page=2&query=%22status%3A2%22"));
    }

    #[test]
    fn build_rejects_bad_url_and_auth() {
        let err = build_request(ApiRequest::new(HttpMethod::Get, "not a url", "x")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = build_request(ApiRequest::new(HttpMethod::Get, URL, "bad\nvalue")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn classify_ok_returns_payload() {
        let outcome = classify(TARGET, Ok(response(200, &[], r#"{"id":1}"#))).unwrap();
        assert_eq!(outcome.body, json!({"id": 1}));
        assert!(outcome.is_last_page);
        assert!(outcome.next_page.is_none());
    }

    #[test]
    fn classify_no_content_is_null() {
        let outcome = classify(TARGET, Ok(response(204, &[], "ignored"))).unwrap();
        assert_eq!(outcome.body, Value::Null);
    }

    #[test]
    fn classify_not_found_ignores_description() {
        let err = classify(
            TARGET,
            Ok(response(404, &[("x-request-id", "abc123")], r#"{"description":"nope"}"#)),
        )
        .unwrap_err();
        let ApiError::NotFound(protocol) = &err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert_eq!(protocol.message(), "The requested entity was not found");
        assert_eq!(protocol.request_id(), Some("abc123"));
        assert_eq!(protocol.api_target(), TARGET);
    }

    #[test]
    fn classify_conflict_uses_description() {
        let err = classify(
            TARGET,
            Ok(response(409, &[], r#"{"description":"Validation failed"}"#)),
        )
        .unwrap_err();
        let ApiError::UnexpectedStatus(protocol) = &err else {
            panic!("expected UnexpectedStatus, got {err:?}");
        };
        assert_eq!(protocol.status(), 409);
        assert_eq!(protocol.message(), "Validation failed");
    }

    #[test]
    fn classify_error_without_description_falls_back() {
        let err = classify(TARGET, Ok(response(502, &[], "<html>bad gateway</html>"))).unwrap_err();
        assert_eq!(err.protocol().unwrap().message(), "unexpected HTTP status 502");
        assert_eq!(err.protocol().unwrap().body(), &Value::Null);
    }

    #[test]
    fn classify_keeps_raw_body_of_non_json_error() {
        let html = "<html>bad gateway from nginx</html>";
        let err = classify(TARGET, Ok(response(502, &[], html))).unwrap_err();
        let ApiError::UnexpectedStatus(protocol) = &err else {
            panic!("expected UnexpectedStatus, got {err:?}");
        };
        assert_eq!(protocol.status(), 502);
        assert_eq!(protocol.body(), &Value::Null);
        assert_eq!(protocol.raw_body(), html);
    }

    #[test]
    fn classify_malformed_success_body_is_null() {
        let outcome = classify(TARGET, Ok(response(200, &[], "{truncated"))).unwrap();
        assert_eq!(outcome.body, Value::Null);
    }

    #[test]
    fn classify_link_header_marks_more_pages() {
        let outcome = classify(
            TARGET,
            Ok(response(
                200,
                &[("Link", r#"<https://acme.freshdesk.com/api/v2/tickets?page=2>; rel="next""#)],
                "[]",
            )),
        )
        .unwrap();
        assert!(!outcome.is_last_page);
        assert_eq!(
            outcome.next_page.as_deref(),
            Some("https://acme.freshdesk.com/api/v2/tickets?page=2")
        );
    }

    #[test]
    fn classify_success_propagates_request_id_and_rate_limit() {
        let outcome = classify(
            TARGET,
            Ok(response(
                200,
                &[
                    ("x-request-id", "abc123"),
                    ("x-ratelimit-total", "3000"),
                    ("x-ratelimit-remaining", "2998"),
                    ("x-ratelimit-used-currentrequest", "1"),
                ],
                "{}",
            )),
        )
        .unwrap();
        assert_eq!(outcome.request_id.as_deref(), Some("abc123"));
        assert_eq!(
            outcome.rate_limit,
            Some(RateLimit {
                total: Some(3000),
                remaining: Some(2998),
                used_current_request: Some(1),
            })
        );
    }

    #[test]
    fn classify_passes_transport_errors_through() {
        let err =
            classify(TARGET, Err(ApiError::transport(TARGET, "connection refused"))).unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[test]
    fn next_link_ignores_other_relations() {
        assert_eq!(next_link(r#"<https://x/a?page=1>; rel="prev""#), None);
        assert_eq!(
            next_link(r#"<https://x/a?page=1>; rel="prev", <https://x/a?page=3>; rel="next""#),
            Some("https://x/a?page=3".to_string())
        );
        assert_eq!(
            next_link(
                r#"<https://acme.freshdesk.com/api/v2/tickets?include=requester,stats&page=2>; rel="next""#
            ),
            Some("https://acme.freshdesk.com/api/v2/tickets?include=requester,stats&page=2".to_string())
        );
        assert_eq!(
            next_link(r#"<https://x/a?ids=1,2&page=1>; rel="prev", <https://x/a?ids=1,2&page=3>; rel="next""#),
            Some("https://x/a?ids=1,2&page=3".to_string())
        );
        assert_eq!(
            next_link(r#"<https://x/a?page=9>; title="a,b"; rel="last next""#),
            Some("https://x/a?page=9".to_string())
        );
    }

    #[test]
    fn classify_link_with_commas_keeps_full_next_url() {
        let next = "https://acme.freshdesk.com/api/v2/tickets?include=requester,stats&page=2";
        let link = format!("<{next}>; rel=\"next\"");
        let outcome = classify(TARGET, Ok(response(200, &[("Link", link.as_str())], "[]"))).unwrap();
        assert!(!outcome.is_last_page);
        assert_eq!(outcome.next_page.as_deref(), Some(next));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = ClientConfig::default().with_base_url("http://localhost:3000/api/v2/");
        let client = FreshdeskClient::new(&config).unwrap();
        assert_eq!(client.endpoint("/tickets"), "http://localhost:3000/api/v2/tickets");
        assert_eq!(client.endpoint("contacts/5"), "http://localhost:3000/api/v2/contacts/5");
    }
}
