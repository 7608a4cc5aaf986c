//! In-process HTTP stub the processor tests run against.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use decl_e2e_client::App;

/// A request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
pub struct Stub {
    logins: AtomicUsize,
    finished: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
}

impl Stub {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Requests other than logins, in arrival order.
    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Non-login requests the stub answered, slow ones included.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

pub async fn spawn() -> (App, Arc<Stub>) {
    let stub = Arc::new(Stub::default());
    let router = Router::new()
        .fallback(handle)
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (
        App::with_client(reqwest::Client::new(), &format!("http://{addr}")),
        stub,
    )
}

fn json_reply(status: StatusCode, body: Value) -> Response {
    (status, axum::Json(body)).into_response()
}

async fn handle(State(stub): State<Arc<Stub>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    let path = parts.uri.path().to_string();
    let method = parts.method.as_str().to_string();

    if path == "/login" {
        stub.logins.fetch_add(1, Ordering::SeqCst);
        return login(&body);
    }

    let authorization = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Ok(mut seen) = stub.seen.lock() {
        seen.push(Seen {
            method: method.clone(),
            path: path.clone(),
            headers: parts.headers.clone(),
            body: body.clone(),
        });
    }

    // Tokens starting with "slow" answer late, so fan-out order can be checked.
    if authorization.as_deref().is_some_and(|a| a.starts_with("slow")) {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    stub.finished.fetch_add(1, Ordering::SeqCst);

    match (method.as_str(), path.as_str()) {
        ("GET", "/health") => json_reply(StatusCode::OK, json!({"status": "ok"})),
        ("GET", "/down") => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        ("GET", "/plain") => (StatusCode::OK, "pong").into_response(),
        ("POST", "/users") => {
            let name = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|b| b["name"].as_str().map(str::to_string))
                .unwrap_or_default();
            json_reply(StatusCode::CREATED, json!({"id": 42, "name": name}))
        }
        ("GET", "/users/42") => json_reply(StatusCode::OK, json!({"id": 42, "name": "ada"})),
        (_, p) if p.ends_with("/echo") => json_reply(
            StatusCode::OK,
            json!({
                "method": method,
                "path": path,
                "query": parts.uri.query(),
                "body": body,
                "authorization": authorization,
            }),
        ),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `{"user": u, "password": p}`: "bad" fails with an error field, "none"
/// answers without a token, anything else yields `tok-<u>`.
fn login(body: &str) -> Response {
    let credentials: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let user = credentials["user"].as_str().unwrap_or_default();
    match credentials["password"].as_str() {
        Some("bad") => json_reply(StatusCode::OK, json!({"error": "invalid credentials"})),
        Some("none") => json_reply(StatusCode::OK, json!({"user": user})),
        _ => json_reply(StatusCode::OK, json!({"id": format!("tok-{user}")})),
    }
}
