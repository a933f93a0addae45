#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> std::path::PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// In-memory school the stub backend serves. Mirrors the REST contract of
/// the real attendance server closely enough for the sidecar.
#[derive(Debug, Default)]
pub struct School {
    pub students: Vec<(i64, String)>,
    pub statuses: HashMap<(String, i64), String>,
    pub save_delay: Duration,
    pub reject_save: Option<(u16, String)>,
    pub daily_body_override: Option<String>,
    /// Dates whose daily roster answers 500.
    pub fail_days: Vec<String>,
}

impl School {
    pub fn with_students(names: &[&str]) -> School {
        School {
            students: names
                .iter()
                .enumerate()
                .map(|(i, n)| (i as i64 + 1, n.to_string()))
                .collect(),
            ..School::default()
        }
    }

    pub fn mark(&mut self, date: &str, id: i64, status: &str) {
        self.statuses
            .insert((date.to_string(), id), status.to_string());
    }

    fn status_of(&self, date: &str, id: i64) -> Option<&str> {
        self.statuses
            .get(&(date.to_string(), id))
            .map(String::as_str)
    }

    fn daily(&self, date: &str) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .students
            .iter()
            .map(|(id, name)| {
                json!({
                    "id": id,
                    "name": name,
                    "status": self.status_of(date, *id),
                    "date": date
                })
            })
            .collect();
        json!(rows)
    }

    fn count(&self, date: &str, status: &str) -> u64 {
        self.students
            .iter()
            .filter(|(id, _)| self.status_of(date, *id) == Some(status))
            .count() as u64
    }
}

#[derive(Clone)]
struct StubState {
    school: Arc<Mutex<School>>,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubState {
    fn record(&self, method: &str, path: &str, body: String) {
        self.requests.lock().expect("requests").push(StubRequest {
            method: method.to_string(),
            path: path.to_string(),
            body,
        });
    }
}

#[derive(Deserialize)]
struct DailyQuery {
    date: String,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ReportQuery {
    date: Option<String>,
}

fn raw_json(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn daily(State(state): State<StubState>, Query(q): Query<DailyQuery>) -> Response {
    state.record("GET", "/api/attendance/daily", String::new());
    let school = state.school.lock().expect("school");
    if let Some(body) = school.daily_body_override.clone() {
        return raw_json(200, body);
    }
    if school.fail_days.contains(&q.date) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Database unavailable" })),
        )
            .into_response();
    }
    Json(school.daily(&q.date)).into_response()
}

async fn save(State(state): State<StubState>, Json(payload): Json<serde_json::Value>) -> Response {
    state.record("POST", "/api/attendance/save", payload.to_string());
    let delay = state.school.lock().expect("school").save_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut school = state.school.lock().expect("school");
    if let Some((status, body)) = school.reject_save.clone() {
        return raw_json(status, body);
    }
    let date = payload["date"].as_str().unwrap_or("").to_string();
    for e in payload["entries"].as_array().cloned().unwrap_or_default() {
        let id = e["studentId"].as_i64().unwrap_or(0);
        let status = e["status"].as_str().unwrap_or("");
        school.mark(&date, id, status);
    }
    StatusCode::CREATED.into_response()
}

async fn create_student(
    State(state): State<StubState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    state.record("POST", "/api/students", payload.to_string());
    let mut school = state.school.lock().expect("school");
    let id = school.students.len() as i64 + 1;
    let name = payload["name"].as_str().unwrap_or("").to_string();
    school.students.push((id, name.clone()));
    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "name": name, "status": "ABSENT" })),
    )
        .into_response()
}

async fn search(State(state): State<StubState>, Query(q): Query<SearchQuery>) -> Response {
    state.record("GET", "/api/students/search", String::new());
    let needle = q.name.to_lowercase();
    let school = state.school.lock().expect("school");
    let found: Vec<serde_json::Value> = school
        .students
        .iter()
        .filter(|(_, n)| n.to_lowercase().contains(&needle))
        .map(|(id, n)| json!({ "id": id, "name": n }))
        .collect();
    Json(json!(found)).into_response()
}

async fn report(State(state): State<StubState>, Query(q): Query<ReportQuery>) -> Response {
    state.record("GET", "/api/attendance/report", String::new());
    let school = state.school.lock().expect("school");
    let date = q.date.unwrap_or_default();
    let total = school.students.len() as u64;
    let present = school.count(&date, "PRESENT");
    let absent = school.count(&date, "ABSENT");
    let rate = if total > 0 {
        present as f64 * 100.0 / total as f64
    } else {
        0.0
    };
    Json(json!({
        "totalStudents": total,
        "presentCount": present,
        "absentCount": absent,
        "attendanceRate": rate
    }))
    .into_response()
}

pub struct StubBackend {
    pub base_url: String,
    pub school: Arc<Mutex<School>>,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubBackend {
    /// Serves `school` on an ephemeral port from a background runtime that
    /// lives as long as the test process.
    pub fn start(school: School) -> StubBackend {
        let state = StubState {
            school: Arc::new(Mutex::new(school)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/api/attendance/daily", get(daily))
            .route("/api/attendance/save", post(save))
            .route("/api/attendance/report", get(report))
            .route("/api/students", post(create_student))
            .route("/api/students/search", get(search))
            .with_state(state.clone());

        let (addr_tx, addr_rx) = mpsc::channel::<SocketAddr>();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("stub runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind stub backend");
                addr_tx
                    .send(listener.local_addr().expect("stub addr"))
                    .expect("report stub addr");
                axum::serve(listener, app).await.expect("serve stub backend");
            });
        });
        let addr = addr_rx.recv().expect("stub backend started");

        StubBackend {
            base_url: format!("http://{}/api", addr),
            school: state.school,
            requests: state.requests,
        }
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

/// A URL nothing is listening on.
pub fn dead_backend_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}/api", addr)
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    parked: HashMap<String, serde_json::Value>,
}

impl Sidecar {
    pub fn spawn(backend_url: &str, extra_args: &[&str]) -> Sidecar {
        let exe = env!("CARGO_BIN_EXE_rollcalld");
        let mut child = Command::new(exe)
            .args(["--backend-url", backend_url, "--today", "2024-01-05"])
            .args(extra_args)
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn rollcalld");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            parked: HashMap::new(),
        }
    }

    pub fn send(&mut self, id: &str, method: &str, params: serde_json::Value) {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
    }

    /// Replies to backend-bound methods can overtake each other; park the
    /// ones we are not waiting for.
    pub fn wait(&mut self, id: &str) -> serde_json::Value {
        if let Some(v) = self.parked.remove(id) {
            return v;
        }
        loop {
            let mut line = String::new();
            self.reader
                .read_line(&mut line)
                .expect("read response line");
            assert!(!line.trim().is_empty(), "sidecar closed before reply {}", id);
            let value: serde_json::Value =
                serde_json::from_str(line.trim()).expect("parse response json");
            let got = value
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if got == id {
                return value;
            }
            self.parked.insert(got, value);
        }
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.send(id, method, params);
        self.wait(id)
    }

    pub fn request_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    pub fn error_code(value: &serde_json::Value) -> String {
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
