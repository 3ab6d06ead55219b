//! Local cockpit backend: REST endpoints plus a push channel on `/ws`.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cockpit_app::AppConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned responses; change them between calls through [`MockBackend::set`].
#[derive(Debug, Clone)]
pub struct Script {
    pub positions: Value,
    pub trades: Value,
    pub order: (u16, Value),
    pub kill_switch: Value,
    pub kill_switch_post: Option<(u16, Value)>,
    pub decide: (u16, Value),
    /// Frames sent on `/ws` after the subscription request.
    pub push_frames: Vec<String>,
    pub push_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            positions: json!([]),
            trades: json!([]),
            order: (200, json!({"status": "success", "order_id": "abc", "avg_px": 1800.5})),
            kill_switch: json!({"enabled": true}),
            kill_switch_post: None,
            decide: (200, json!({"status": "noop"})),
            push_frames: Vec::new(),
            push_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Default)]
struct Shared {
    script: Mutex<Script>,
    hits: Mutex<HashMap<String, u32>>,
    subscribe_requests: Mutex<Vec<String>>,
}

impl Shared {
    fn hit(&self, key: impl Into<String>) {
        *self.hits.lock().unwrap().entry(key.into()).or_default() += 1;
    }

    fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }
}

pub struct MockBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockBackend {
    pub async fn start(script: Script) -> Self {
        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            ..Shared::default()
        });
        let router = Router::new()
            .route("/metrics", get(metrics))
            .route("/equity", get(equity))
            .route("/positions", get(positions))
            .route("/trades", get(trades))
            .route("/status", get(status))
            .route("/prices", get(prices))
            .route("/reasoning", get(reasoning))
            .route("/market/snapshot", get(market_snapshot))
            .route("/kill_switch", get(kill_switch).post(set_kill_switch))
            .route("/order/limit_ioc", post(order))
            .route("/decide_and_execute", post(decide))
            .route("/ws", get(push_channel))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { addr, shared }
    }

    /// Config pointing both paths at this backend.
    pub fn config(&self, symbols: &[&str]) -> AppConfig {
        let mut config = AppConfig {
            ws_url: format!("ws://{}/ws", self.addr),
            reconnect_delay_ms: 100,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..AppConfig::default()
        };
        config.api.base_url = format!("http://{}", self.addr);
        config.api.request_timeout_ms = Some(2_000);
        config.poll.interval_ms = 60_000;
        config
    }

    pub fn set(&self, update: impl FnOnce(&mut Script)) {
        update(&mut self.shared.script.lock().unwrap());
    }

    pub fn hits(&self, key: &str) -> u32 {
        self.shared.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn subscribe_requests(&self) -> Vec<String> {
        self.shared.subscribe_requests.lock().unwrap().clone()
    }
}

fn reply(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    (status, Json(body)).into_response()
}

async fn metrics(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/metrics");
    Json(json!({
        "total_value": 10_100.0,
        "win_rate": 0.55,
        "sharpe": 1.2,
        "max_dd": 0.04,
        "trades": 12
    }))
}

async fn equity(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/equity");
    let now = chrono::Utc::now();
    Json(json!([
        {"timestamp": (now - chrono::Duration::minutes(5)).to_rfc3339(), "value": 10_000.0},
        {"timestamp": now.to_rfc3339(), "value": 10_100.0}
    ]))
}

async fn positions(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/positions");
    Json(s.script().positions)
}

async fn trades(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/trades");
    Json(s.script().trades)
}

async fn status(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/status");
    Json(json!({"bot": "running", "market": "synced", "api": "ok", "db": "ok", "ws": "connected"}))
}

async fn prices(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/prices");
    Json(json!({"BTC": 65_000.0, "ETH": 3_400.0}))
}

async fn reasoning(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("/reasoning");
    Json(json!([]))
}

async fn market_snapshot(
    State(s): State<Arc<Shared>>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    let symbol = q.get("symbols").cloned().unwrap_or_default();
    s.hit(format!("/market/snapshot?{symbol}"));
    Json(json!({
        "micro": {"spread_bps": 1.5, "obi": 0.1, "rtn_5s": 0.0},
        "meta": {"insufficient": false}
    }))
}

async fn kill_switch(State(s): State<Arc<Shared>>) -> Json<Value> {
    s.hit("GET /kill_switch");
    Json(s.script().kill_switch)
}

async fn set_kill_switch(State(s): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    s.hit("POST /kill_switch");
    match s.script().kill_switch_post {
        Some((status, body)) => reply(status, body),
        None => reply(200, json!({"enabled": body["enabled"]})),
    }
}

async fn order(State(s): State<Arc<Shared>>, Json(_body): Json<Value>) -> Response {
    s.hit("/order/limit_ioc");
    let (status, body) = s.script().order;
    reply(status, body)
}

async fn decide(State(s): State<Arc<Shared>>) -> Response {
    s.hit("/decide_and_execute");
    let (status, body) = s.script().decide;
    reply(status, body)
}

async fn push_channel(State(s): State<Arc<Shared>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_push(socket, s))
}

async fn serve_push(mut socket: WebSocket, shared: Arc<Shared>) {
    shared.hit("/ws");
    if let Some(Ok(Message::Text(text))) = socket.recv().await {
        shared.subscribe_requests.lock().unwrap().push(text.as_str().to_string());
    }

    let script = shared.script();
    tokio::time::sleep(script.push_delay).await;
    for frame in script.push_frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }

    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
