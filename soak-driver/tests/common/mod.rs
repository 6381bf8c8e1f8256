//! Stub control plane for driver integration tests.
//!
//! Serves the three relay endpoints on an ephemeral port with a configurable
//! register status. Relays are listed only if their registration succeeded.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared stub state, inspectable from tests.
#[derive(Clone)]
pub struct StubControlPlane {
    register_status: StatusCode,
    registered: Arc<Mutex<Vec<String>>>,
    heartbeats: Arc<AtomicUsize>,
}

impl StubControlPlane {
    /// Stub that answers every register with `register_status`.
    pub fn new(register_status: StatusCode) -> Self {
        Self {
            register_status,
            registered: Arc::new(Mutex::new(Vec::new())),
            heartbeats: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stub that accepts everything.
    pub fn accepting() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Relay ids registered so far.
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }

    /// Heartbeats received so far.
    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    fn router(self) -> Router {
        Router::new()
            .route("/v1/relays/register", post(register))
            .route("/v1/relays/heartbeat", post(heartbeat))
            .route("/v1/relays", get(list))
            .with_state(self)
    }

    /// Serve on `127.0.0.1:0` inside the current runtime.
    pub async fn spawn(self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Serve from a dedicated thread, for tests that block on a child process.
    pub fn spawn_on_thread(self) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let addr = self.spawn().await;
                tx.send(addr).unwrap();
                std::future::pending::<()>().await;
            });
        });
        rx.recv().unwrap()
    }
}

async fn register(State(stub): State<StubControlPlane>, Json(body): Json<Value>) -> StatusCode {
    if stub.register_status.is_success() {
        if let Some(id) = body["relay_id"].as_str() {
            stub.registered.lock().unwrap().push(id.to_string());
        }
    }
    stub.register_status
}

async fn heartbeat(State(stub): State<StubControlPlane>, Json(body): Json<Value>) -> StatusCode {
    let load = body["load_pct"].as_f64().unwrap_or(-1.0);
    if !(5.0..=90.0).contains(&load) {
        return StatusCode::BAD_REQUEST;
    }
    stub.heartbeats.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn list(State(stub): State<StubControlPlane>) -> Json<Value> {
    let mut entries: Vec<Value> = stub
        .registered()
        .into_iter()
        .map(|id| json!({ "relay_id": id, "region": "loadtest-us" }))
        .collect();
    // entries the driver must skip
    entries.push(json!("not-an-object"));
    entries.push(json!({ "region": "no-id" }));
    Json(Value::Array(entries))
}
