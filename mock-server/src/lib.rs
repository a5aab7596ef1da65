use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/v2";
const DEFAULT_PER_PAGE: usize = 30;
const MAX_PER_PAGE: usize = 100;
const RATE_LIMIT_TOTAL: &str = "3000";
const RETRY_AFTER_SECS: &str = "30";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub status: u8,
    pub priority: u8,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct CreateTicket {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub status: Option<u8>,
    pub priority: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateTicket {
    pub subject: Option<String>,
    pub status: Option<u8>,
    pub priority: Option<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct CreateContact {
    pub name: String,
    pub email: String,
}

/// Freshdesk's error body: `{"description": ..., "errors": [...]}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

/// What `/echo` saw on the wire.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub query: Option<String>,
    pub json: Value,
    pub fields: Vec<(String, String)>,
    pub files: Vec<EchoFile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoFile {
    pub name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Deserialize)]
pub struct Paging {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Deserialize)]
pub struct Delay {
    pub ms: u64,
}

#[derive(Default)]
pub struct Store {
    tickets: BTreeMap<u64, Ticket>,
    contacts: Vec<Contact>,
    next_id: u64,
}

impl Store {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::default();
    Router::new()
        .route("/api/v2/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/v2/tickets/{id}",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
        .route("/api/v2/contacts", post(create_contact))
        .route("/api/v2/echo", post(echo).put(echo))
        .route("/api/v2/slow", get(slow))
        .route("/api/v2/rate-limited", get(rate_limited))
        .layer(middleware::from_fn(require_auth))
        .layer(middleware::from_fn(stamp_headers))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock freshdesk listening");
    }
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Request id and rate-limit counters on every response, as Freshdesk does.
async fn stamp_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(id) = HeaderValue::try_from(Uuid::new_v4().to_string()) {
        headers.insert("x-request-id", id);
    }
    headers.insert("x-ratelimit-total", HeaderValue::from_static(RATE_LIMIT_TOTAL));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("2999"));
    headers.insert("x-ratelimit-used-currentrequest", HeaderValue::from_static("1"));
    response
}

async fn require_auth(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .is_some_and(|value| !value.is_empty());
    if authorized {
        return next.run(request).await;
    }
    error_response(
        StatusCode::UNAUTHORIZED,
        "You have to be logged in to perform this action.",
        Vec::new(),
    )
}

fn error_response(status: StatusCode, description: &str, errors: Vec<FieldError>) -> Response {
    let body = ErrorBody {
        description: description.to_string(),
        errors,
    };
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Record not found", Vec::new())
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

async fn list_tickets(
    State(db): State<Db>,
    Query(paging): Query<Paging>,
    headers: HeaderMap,
) -> Response {
    let page = paging.page.unwrap_or(1).max(1);
    let per_page = paging.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let store = db.read().await;
    let tickets: Vec<Ticket> = store
        .tickets
        .values()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect();
    let has_more = store.tickets.len() > page.saturating_mul(per_page);
    drop(store);

    let mut response = Json(tickets).into_response();
    if has_more {
        let host = header_string(&headers, header::HOST).unwrap_or_else(|| "localhost".to_string());
        let link = format!(
            "<http://{host}{API_PREFIX}/tickets?page={}&per_page={per_page}>; rel=\"next\"",
            page.saturating_add(1)
        );
        if let Ok(value) = HeaderValue::try_from(link) {
            response.headers_mut().insert(header::LINK, value);
        }
    }
    response
}

async fn create_ticket(State(db): State<Db>, body: Bytes) -> Response {
    let Ok(input) = serde_json::from_slice::<CreateTicket>(&body) else {
        // Freshdesk answers malformed JSON without a description.
        let body = serde_json::json!({
            "code": "invalid_json",
            "message": "Request body has invalid json format"
        });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };
    let Some(subject) = input.subject.filter(|s| !s.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            vec![FieldError {
                field: "subject".to_string(),
                message: "It should be a/an String".to_string(),
                code: "missing_field".to_string(),
            }],
        );
    };

    let mut store = db.write().await;
    let ticket = Ticket {
        id: store.allocate_id(),
        subject,
        description: input.description,
        email: input.email,
        status: input.status.unwrap_or(2),
        priority: input.priority.unwrap_or(1),
        tags: input.tags,
    };
    store.tickets.insert(ticket.id, ticket.clone());
    (StatusCode::CREATED, Json(ticket)).into_response()
}

async fn get_ticket(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    match store.tickets.get(&id) {
        Some(ticket) => Json(ticket.clone()).into_response(),
        None => not_found(),
    }
}

async fn update_ticket(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateTicket>,
) -> Response {
    let mut store = db.write().await;
    let Some(ticket) = store.tickets.get_mut(&id) else {
        return not_found();
    };
    if let Some(subject) = input.subject {
        ticket.subject = subject;
    }
    if let Some(status) = input.status {
        ticket.status = status;
    }
    if let Some(priority) = input.priority {
        ticket.priority = priority;
    }
    Json(ticket.clone()).into_response()
}

async fn delete_ticket(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let mut store = db.write().await;
    match store.tickets.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

async fn create_contact(State(db): State<Db>, Json(input): Json<CreateContact>) -> Response {
    let mut store = db.write().await;
    if store.contacts.iter().any(|c| c.email == input.email) {
        return error_response(
            StatusCode::CONFLICT,
            "Validation failed",
            vec![FieldError {
                field: "email".to_string(),
                message: "It should be a unique value".to_string(),
                code: "duplicate_value".to_string(),
            }],
        );
    }
    let contact = Contact {
        id: store.allocate_id(),
        name: input.name,
        email: input.email,
    };
    store.contacts.push(contact.clone());
    (StatusCode::CREATED, Json(contact)).into_response()
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

async fn echo(request: Request) -> Response {
    let headers = request.headers().clone();
    let mut echo = Echo {
        method: request.method().to_string(),
        content_type: header_string(&headers, header::CONTENT_TYPE),
        authorization: header_string(&headers, header::AUTHORIZATION),
        query: request.uri().query().map(str::to_owned),
        ..Echo::default()
    };

    let is_multipart = echo
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if is_multipart {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_owned);
                    let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
                    echo.files.push(EchoFile {
                        name,
                        file_name,
                        content_type,
                        size,
                    });
                }
                None => {
                    let value = field.text().await.unwrap_or_default();
                    echo.fields.push((name, value));
                }
            }
        }
    } else {
        let body = match Bytes::from_request(request, &()).await {
            Ok(body) => body,
            Err(rejection) => return rejection.into_response(),
        };
        echo.json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    }

    Json(echo).into_response()
}

async fn slow(Query(delay): Query<Delay>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(delay.ms)).await;
    Json(serde_json::json!({ "slept_ms": delay.ms }))
}

async fn rate_limited() -> Response {
    let mut response = error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "You have exceeded the limit of requests per hour",
        Vec::new(),
    );
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    response
}
