//! A stub patrol API served by axum, plus helpers to wire a client at it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use guard_lib::adapters::TerminalFeedback;
use guard_lib::app::AppContext;
use guard_lib::config::Config;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const T0: i64 = 1_700_000_000;
pub const USERNAME: &str = "omar";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct Stub {
    pub unhealthy: AtomicBool,
    pub reject_submissions: AtomicBool,
    pub unauthorized: AtomicBool,
    pub created: Mutex<Vec<Value>>,
    pub list_queries: Mutex<Vec<HashMap<String, String>>>,
    pub auth_headers: Mutex<Vec<Option<String>>>,
    pub records: Vec<Value>,
}

impl Stub {
    pub fn with_records(count: usize) -> Self {
        let records = (0..count)
            .map(|i| {
                let time = T0 + i as i64 * 60;
                json!({
                    "id": format!("r{}", i),
                    "point": format!("{}", i % 12 + 1),
                    "guardname": if i % 3 == 0 { "Ahmed" } else { "Omar" },
                    // The server sends timestamps as strings.
                    "time": time.to_string(),
                    "servertime": time,
                    "imageid": format!("img-{}", i),
                    "note": ""
                })
            })
            .collect();
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<Value> {
        self.created.lock().unwrap().clone()
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

fn user() -> Value {
    json!({
        "userId": 7,
        "guardName": " Omar ",
        "uid": "u-7",
        "permissions": ["scan", "logs"],
        "updatedAt": T0
    })
}

async fn health(State(stub): State<Arc<Stub>>) -> StatusCode {
    if stub.unhealthy.load(Ordering::SeqCst) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn users(Query(params): Query<HashMap<String, String>>) -> Response {
    let ok = params.get("username").map(String::as_str) == Some(USERNAME)
        && params.get("password").map(String::as_str) == Some(PASSWORD);
    if ok {
        Json(user()).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid credentials"}))).into_response()
    }
}

async fn create(State(stub): State<Arc<Stub>>, Json(body): Json<Value>) -> Response {
    if stub.unauthorized.load(Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if stub.reject_submissions.load(Ordering::SeqCst) {
        let detail = json!({
            "detail": [
                {"loc": ["body", "point"], "msg": "Point is closed", "input": body["point"]},
                {"loc": ["body", "note"], "msg": "Too long"}
            ]
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(detail)).into_response();
    }
    stub.created.lock().unwrap().push(body);
    StatusCode::CREATED.into_response()
}

async fn list(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    stub.auth_headers.lock().unwrap().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    if stub.unauthorized.load(Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(image_id) = params.get("imageid") {
        let size = if image_id == "tiny" { 10 } else { 256 };
        return ([("content-type", "image/jpeg")], vec![0xAB_u8; size]).into_response();
    }
    stub.list_queries.lock().unwrap().push(params.clone());

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
    let total = stub.records.len();
    let records: Vec<Value> = stub
        .records
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .cloned()
        .collect();
    Json(json!({
        "records": records,
        "total": total,
        "total_pages": total.div_ceil(limit),
        "current_page": page,
        "page_size": limit
    }))
    .into_response()
}

/// Serves `stub` on an ephemeral local port.
pub async fn serve(stub: Arc<Stub>) -> SocketAddr {
    let app = Router::new()
        .route("/health", get(health))
        .route("/users", get(users))
        .route("/industerialsecurity", get(list).post(create))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Everything the feedback sink printed.
#[derive(Clone, Default)]
pub struct Output(Arc<Mutex<Vec<u8>>>);

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Output {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

pub struct Client {
    pub ctx: AppContext,
    pub output: Output,
    _data_dir: TempDir,
}

/// A client pointed at `addr` with a fresh data directory.
pub async fn client(addr: SocketAddr) -> Client {
    let data_dir = tempfile::tempdir().unwrap();
    let vars: HashMap<&str, String> = HashMap::from([
        ("GUARD_API_BASE_URL", format!("http://{}", addr)),
        ("GUARD_DATA_DIR", data_dir.path().display().to_string()),
        ("GUARD_SERVER_CHECK_SECS", "1".to_string()),
        ("GUARD_LINK_CHECK_SECS", "1".to_string()),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    let output = Output::default();
    let feedback = Arc::new(TerminalFeedback::new(Box::new(output.clone()), false));
    let ctx = AppContext::build(Arc::new(config), feedback).await.unwrap();
    Client {
        ctx,
        output,
        _data_dir: data_dir,
    }
}
