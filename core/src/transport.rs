//! Executors that turn an `HttpRequest` into an `HttpResponse`.
//!
//! `ReqwestTransport` is the default. Anything implementing `HttpTransport`
//! can stand in for it, e.g. a recording fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse};

/// Executes exactly one HTTP round-trip per call.
///
/// Implementations return `Ok` for every response the server sent, whatever
/// its status; status interpretation belongs to `classify`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// reqwest-backed transport (rustls).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout_ms: Option<u64>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_ms: config.timeout_ms,
        })
    }

    fn map_error(&self, api_target: String, err: reqwest::Error) -> ApiError {
        match self.timeout_ms {
            Some(timeout_ms) if err.is_timeout() => ApiError::Timeout {
                api_target,
                timeout_ms,
            },
            _ => ApiError::transport(api_target, err),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let api_target = request.api_target();
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(HttpBody::Json(text)) => builder.body(text),
            Some(HttpBody::Multipart(parts)) => builder.multipart(into_form(parts)?),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(api_target.clone(), e))?;

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| self.map_error(api_target, e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Header values are decoded lossily so obs-text bytes never drop a header.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn into_form(parts: Vec<FormPart>) -> Result<Form, ApiError> {
    parts.into_iter().try_fold(Form::new(), |form, part| match part {
        FormPart::Text { name, value } => Ok(form.text(name, value)),
        FormPart::File {
            name,
            file_name,
            content_type,
            bytes,
        } => {
            let mut file = Part::bytes(bytes).file_name(file_name);
            if let Some(content_type) = content_type {
                file = file.mime_str(&content_type).map_err(|e| {
                    ApiError::InvalidRequest(format!("invalid content type {content_type}: {e}"))
                })?;
            }
            Ok(form.part(name, file))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_rejects_malformed_content_type() {
        let parts = vec![FormPart::File {
            name: "attachments[]".to_string(),
            file_name: "x.bin".to_string(),
            content_type: Some("not a mime".to_string()),
            bytes: vec![1, 2, 3],
        }];
        let err = into_form(parts).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn non_utf8_header_values_are_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-request-id",
            reqwest::header::HeaderValue::from_bytes(b"req-\xe9").unwrap(),
        );
        headers.insert("link", reqwest::header::HeaderValue::from_static("<https://x/a?page=2>; rel=\"next\""));

        let pairs = header_pairs(&headers);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("x-request-id".to_string(), "req-\u{fffd}".to_string())));
        assert!(pairs.contains(&("link".to_string(), "<https://x/a?page=2>; rel=\"next\"".to_string())));
    }

    #[test]
    fn transport_builds_with_timeout() {
        let transport = ReqwestTransport::new(&ClientConfig::default().with_timeout_ms(250)).unwrap();
        assert_eq!(transport.timeout_ms, Some(250));
    }
}
