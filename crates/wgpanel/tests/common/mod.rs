//! In-process mock of the WireGuard management backend
//!
//! Serves the REST routes the stores talk to from an in-memory peer list and
//! records every request path so tests can count calls.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use wgpanel::{Config, Panel};

/// Shared state of the mock backend
#[derive(Default)]
pub struct MockState {
    /// Peer records as the backend would serialize them
    pub peers: Mutex<Vec<Value>>,
    /// Raw (still percent-encoded) paths of every request, in arrival order
    pub paths: Mutex<Vec<String>>,
    /// Number of `GET /peers` calls
    pub list_calls: AtomicUsize,
    /// Number of `GET /stats` calls
    pub stats_calls: AtomicUsize,
    /// Canned failure returned by `DELETE /peers/{id}`
    pub remove_failure: Mutex<Option<(StatusCode, Value)>>,
    /// Makes `GET /stats` answer 500 with a plain text body
    pub stats_broken: Mutex<bool>,
    /// Artificial latency of `GET /peers`
    pub list_delay: Mutex<Duration>,
    /// Stored global settings
    pub settings: Mutex<Value>,
    /// Makes `PATCH /peers/{id}` answer 204 without echoing the record
    pub update_no_content: Mutex<bool>,
    /// Raw body served by `GET /peers/config/{id}` in place of the generated one
    pub config_body: Mutex<Option<Vec<u8>>>,
}

impl MockState {
    /// Number of `GET /peers` calls so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `GET /stats` calls so far
    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    /// Recorded paths
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

/// A running mock backend
pub struct MockBackend {
    /// Base URL, e.g. `http://127.0.0.1:40123`
    pub url: String,
    /// Backend state, shared with the server task
    pub state: Arc<MockState>,
}

impl MockBackend {
    /// Start a backend serving `peers`
    pub async fn start(peers: Vec<Value>) -> Self {
        let state = Arc::new(MockState::default());
        *state.peers.lock() = peers;
        *state.settings.lock() = json!({
            "serverAddress": "10.0.0.1/24",
            "dns": "1.1.1.1",
            "mtu": 1420,
            "keepalive": 25,
            "endpoint": "vpn.example.com:51820"
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Configuration pointing at this backend
    pub fn config(&self) -> Config {
        Config::new(self.url.clone()).with_request_timeout(5)
    }

    /// A panel talking to this backend
    pub fn panel(&self) -> Panel {
        Panel::new(self.config()).unwrap()
    }
}

/// A backend record with the given identity and handshake
pub fn peer_json(id: &str, name: &str, last_handshake: &str) -> Value {
    json!({
        "id": id,
        "publicKey": id,
        "name": name,
        "allowedIPs": ["10.0.0.2/32"],
        "lastHandshake": last_handshake,
        "receiveBytes": 1024,
        "transmitBytes": 2048
    })
}

/// Handshake timestamp `secs` seconds in the past
pub fn seconds_ago(secs: i64) -> String {
    (Utc::now() - chrono::TimeDelta::seconds(secs)).to_rfc3339()
}

/// A URL on localhost where nothing listens
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/peers", get(list_peers).post(create_peer))
        .route("/peers/{id}", patch(update_peer).delete(remove_peer))
        .route("/peers/regenerate-keys/{id}", post(regenerate_keys))
        .route("/peers/config/{id}", get(peer_config))
        .route("/peers/qr/{id}", get(peer_qr))
        .route("/settings", get(get_settings).post(save_settings))
        .route("/stats", get(stats))
        .route("/stats/history", get(stats_history))
        .layer(middleware::from_fn_with_state(state.clone(), record_path))
        .with_state(state)
}

async fn record_path(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    state.paths.lock().push(req.uri().path().to_string());
    next.run(req).await
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "peer not found" }))).into_response()
}

fn client_config(name: &str) -> String {
    format!("[Interface]\nPrivateKey = priv-{name}\nAddress = 10.0.0.5/32\n\n[Peer]\nPublicKey = server=\n")
}

async fn list_peers(State(state): State<Arc<MockState>>) -> Json<Vec<Value>> {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.list_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Json(state.peers.lock().clone())
}

async fn create_peer(State(state): State<Arc<MockState>>, Json(form): Json<Value>) -> Response {
    let name = form["name"].as_str().unwrap_or_default().to_string();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Name is required\n").into_response();
    }

    let id = format!("{name}-key=");
    let mut record = peer_json(&id, &name, "0");
    record["allowedIPs"] = form["allowedIPs"].clone();
    state.peers.lock().push(record);

    let body = json!({
        "id": id,
        "publicKey": id,
        "name": name,
        "allowedIPs": form["allowedIPs"],
        "config": client_config(&name),
        "privateKey": format!("priv-{name}")
    });
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn update_peer(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> Response {
    if *state.update_no_content.lock() {
        return StatusCode::NO_CONTENT.into_response();
    }
    let mut peers = state.peers.lock();
    let Some(peer) = peers.iter_mut().find(|p| p["id"] == id.as_str()) else {
        return not_found();
    };
    if let (Some(target), Some(changes)) = (peer.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    // The backend reports a fresh handshake after reconfiguring
    peer["lastHandshake"] = json!(seconds_ago(1));
    Json(peer.clone()).into_response()
}

async fn remove_peer(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if let Some((status, body)) = state.remove_failure.lock().clone() {
        return (status, Json(body)).into_response();
    }
    let mut peers = state.peers.lock();
    let before = peers.len();
    peers.retain(|p| p["id"] != id.as_str());
    if peers.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn regenerate_keys(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    let peers = state.peers.lock();
    let Some(peer) = peers.iter().find(|p| p["id"] == id.as_str()) else {
        return not_found();
    };
    let name = peer["name"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "id": id,
        "publicKey": id,
        "name": name,
        "allowedIPs": peer["allowedIPs"],
        "config": client_config(&format!("{name}-2"))
    }))
    .into_response()
}

async fn peer_config(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if let Some(body) = state.config_body.lock().clone() {
        return ([("content-type", "text/plain")], body).into_response();
    }
    let peers = state.peers.lock();
    match peers.iter().find(|p| p["id"] == id.as_str()) {
        Some(peer) => client_config(peer["name"].as_str().unwrap_or_default()).into_response(),
        // Plain text, the way Go's http.Error answers
        None => (StatusCode::NOT_FOUND, "peer not found\n").into_response(),
    }
}

async fn peer_qr(Path(_id): Path<String>) -> Response {
    (
        [("content-type", "image/png")],
        vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
    )
        .into_response()
}

async fn get_settings(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(state.settings.lock().clone())
}

async fn save_settings(State(state): State<Arc<MockState>>, Json(settings): Json<Value>) -> StatusCode {
    *state.settings.lock() = settings;
    StatusCode::NO_CONTENT
}

async fn stats(State(state): State<Arc<MockState>>) -> Response {
    state.stats_calls.fetch_add(1, Ordering::SeqCst);
    if *state.stats_broken.lock() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response();
    }
    let peer_count = state.peers.lock().len();
    Json(json!({
        "interfaceName": "wg0",
        "publicKey": "server=",
        "listenPort": 51820,
        "subnet": "10.0.0.0/24",
        "peerCount": peer_count,
        "totalRx": 4096,
        "totalTx": 8192
    }))
    .into_response()
}

async fn stats_history() -> Json<Value> {
    Json(json!([
        { "timestamp": 1767225600, "totalRx": 100, "totalTx": 200 },
        { "timestamp": 1767225660, "totalRx": 150, "totalTx": 260 }
    ]))
}
