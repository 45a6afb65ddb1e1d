//! In-process fake of the AstraDNS backend for integration tests.
//!
//! Mirrors the real server's quirks: integer ids, `null` for empty
//! collections, `{"error": ...}` bodies, and 401 for a missing or wrong
//! token.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN: &str = "tok1";

/// One request as the backend saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

pub struct BackendState {
    pub token: String,
    pub stats: Value,
    pub qps: Value,
    pub config: Value,
    pub blocklists: Vec<(u64, String)>,
    pub redirects: Vec<(u64, String, String)>,
    pub blocked_domains: Vec<String>,
    pub next_id: u64,
    /// Status forced onto every protected route
    pub fail_status: Option<u16>,
    pub config_put_status: Option<u16>,
    /// Per-request delays for `GET /api/blocklists`, snapshot taken first
    pub blocklist_get_delays: VecDeque<Duration>,
    pub seen: Vec<Seen>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            token: TOKEN.to_string(),
            stats: json!({"total_requests": 100, "blocked": 25, "top_domains": {"a.com": 10}}),
            qps: json!({"2024-01-01T10:00": 1, "2024-01-01T10:01": 3}),
            config: json!({"dns_port": "53", "api_port": "8080", "jwt_secret": "x"}),
            blocklists: Vec::new(),
            redirects: Vec::new(),
            blocked_domains: Vec::new(),
            next_id: 1,
            fail_status: None,
            config_put_status: None,
            blocklist_get_delays: VecDeque::new(),
            seen: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve on an ephemeral port and return the base URL
    pub async fn spawn(&self) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.lock().seen.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.state
            .lock()
            .seen
            .iter()
            .filter(|s| s.method == method && s.path == path)
            .count()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/api/stats", get(stats))
            .route("/api/qps", get(qps))
            .route("/api/block", post(block))
            .route("/api/config", get(get_config).put(put_config))
            .route("/api/blocklists", get(list_blocklists).post(add_blocklist))
            .route("/api/blocklists/{id}", delete(delete_blocklist))
            .route("/api/redirects", get(list_redirects).post(add_redirect))
            .route("/api/redirects/{id}", delete(delete_redirect))
            .route("/raw/{kind}", get(raw))
            .with_state(self.clone())
    }
}

fn error(status: u16, message: &str) -> Response {
    (
        StatusCode::from_u16(status).unwrap(),
        Json(json!({"error": message})),
    )
        .into_response()
}

fn record(backend: &FakeBackend, method: Method, path: &str, headers: &HeaderMap, body: Option<Value>) {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    backend.state.lock().seen.push(Seen {
        method: method.to_string(),
        path: path.to_string(),
        authorization: header_str(header::AUTHORIZATION),
        content_type: header_str(header::CONTENT_TYPE),
        body,
    });
}

/// Protected-route guard, same rules as the real middleware
fn guard(
    backend: &FakeBackend,
    method: Method,
    path: &str,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Result<(), Response> {
    record(backend, method, path, headers, body);
    let state = backend.state.lock();
    let token = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    match token {
        None | Some("") => return Err(error(401, "Требуется авторизация")),
        Some(t) if t != state.token => return Err(error(401, "Недействительный токен")),
        _ => {}
    }
    if let Some(status) = state.fail_status {
        return Err(error(status, "Ошибка базы данных"));
    }
    Ok(())
}

async fn login(State(b): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&b, Method::POST, "/login", &headers, Some(body.clone()));
    if body["username"] == "admin" && body["password"] == "password" {
        let token = b.state.lock().token.clone();
        Json(json!({"token": token})).into_response()
    } else {
        error(401, "Неверные данные")
    }
}

async fn stats(State(b): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(r) = guard(&b, Method::GET, "/api/stats", &headers, None) {
        return r;
    }
    Json(b.state.lock().stats.clone()).into_response()
}

async fn qps(State(b): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(r) = guard(&b, Method::GET, "/api/qps", &headers, None) {
        return r;
    }
    Json(b.state.lock().qps.clone()).into_response()
}

async fn block(State(b): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = guard(&b, Method::POST, "/api/block", &headers, Some(body.clone())) {
        return r;
    }
    let domain = body["domain"].as_str().unwrap_or_default().to_string();
    b.state.lock().blocked_domains.push(domain);
    Json(json!({"message": "Домен добавлен в блоклист"})).into_response()
}

async fn get_config(State(b): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(r) = guard(&b, Method::GET, "/api/config", &headers, None) {
        return r;
    }
    Json(b.state.lock().config.clone()).into_response()
}

async fn put_config(State(b): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = guard(&b, Method::PUT, "/api/config", &headers, Some(body.clone())) {
        return r;
    }
    let mut state = b.state.lock();
    if let Some(status) = state.config_put_status {
        return error(status, "Ошибка обновления dns_port");
    }
    state.config = body;
    Json(json!({"message": "Конфигурация обновлена"})).into_response()
}

async fn list_blocklists(State(b): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(r) = guard(&b, Method::GET, "/api/blocklists", &headers, None) {
        return r;
    }
    let (snapshot, delay) = {
        let mut state = b.state.lock();
        let snapshot: Vec<Value> = state
            .blocklists
            .iter()
            .map(|(id, url)| json!({"id": id, "url": url}))
            .collect();
        (snapshot, state.blocklist_get_delays.pop_front())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if snapshot.is_empty() {
        Json(Value::Null).into_response()
    } else {
        Json(Value::Array(snapshot)).into_response()
    }
}

async fn add_blocklist(State(b): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = guard(&b, Method::POST, "/api/blocklists", &headers, Some(body.clone())) {
        return r;
    }
    let mut state = b.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    let url = body["url"].as_str().unwrap_or_default().to_string();
    state.blocklists.push((id, url));
    Json(json!({"message": "Блоклист добавлен"})).into_response()
}

async fn delete_blocklist(State(b): State<FakeBackend>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let path = format!("/api/blocklists/{}", id);
    if let Err(r) = guard(&b, Method::DELETE, &path, &headers, None) {
        return r;
    }
    let mut state = b.state.lock();
    state.blocklists.retain(|(i, _)| i.to_string() != id);
    Json(json!({"message": "Блоклист удалён"})).into_response()
}

async fn list_redirects(State(b): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(r) = guard(&b, Method::GET, "/api/redirects", &headers, None) {
        return r;
    }
    let state = b.state.lock();
    if state.redirects.is_empty() {
        return Json(Value::Null).into_response();
    }
    let items: Vec<Value> = state
        .redirects
        .iter()
        .map(|(id, domain, dns)| json!({"id": id, "domain": domain, "dns": dns}))
        .collect();
    Json(Value::Array(items)).into_response()
}

async fn add_redirect(State(b): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = guard(&b, Method::POST, "/api/redirects", &headers, Some(body.clone())) {
        return r;
    }
    let mut state = b.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    let domain = body["domain"].as_str().unwrap_or_default().to_string();
    let dns = body["dns"].as_str().unwrap_or_default().to_string();
    state.redirects.push((id, domain, dns));
    Json(json!({"message": "Перенаправление добавлено"})).into_response()
}

async fn delete_redirect(State(b): State<FakeBackend>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let path = format!("/api/redirects/{}", id);
    if let Err(r) = guard(&b, Method::DELETE, &path, &headers, None) {
        return r;
    }
    let mut state = b.state.lock();
    state.redirects.retain(|(i, _, _)| i.to_string() != id);
    Json(json!({"message": "Перенаправление удалено"})).into_response()
}

/// Unprotected odd responses for transport-level tests
async fn raw(State(b): State<FakeBackend>, headers: HeaderMap, Path(kind): Path<String>) -> Response {
    record(&b, Method::GET, &format!("/raw/{}", kind), &headers, None);
    match kind.as_str() {
        "empty" => StatusCode::OK.into_response(),
        "html" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "forbidden" => error(403, "forbidden"),
        "teapot" => (StatusCode::IM_A_TEAPOT, "short and stout").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Json(json!({"ok": true})).into_response()
        }
        _ => error(404, "not found"),
    }
}

/// Poll `check` until it returns true or the deadline passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
