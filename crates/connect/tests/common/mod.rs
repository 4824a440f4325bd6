// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Shared fixtures: a mock venue adapter speaking a minimal JSON dialect
//! and a scriptable Axum WebSocket server.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use serde_json::{Value, json};
use tradelink_connect::{
    ControlOp, HttpError, HttpResult, InboundMessage, ResponseBody, SessionResult, StreamCallback,
    Subscription, SubscriptionSpec, VenueAdapter, VenueRequest,
};
use ustr::Ustr;

// ------------------------------------------------------------------------------------------------
// Mock adapter
// ------------------------------------------------------------------------------------------------

/// Adapter for a fictive venue. The wire dialect:
///
/// - client → server: `{"op":"login","key":K}`, `{"op":"subscribe","args":[..]}`,
///   `{"op":"unsubscribe","args":[..]}`, `{"op":"echo","topic":T,"data":D}`
/// - server → client: `{"event":"login","code":"0"|"1"}`, `{"event":"subscribed"}`,
///   `{"event":"reconnect"}`, `{"topic":T,"data":D}`
#[derive(Debug, Default)]
pub struct MockAdapter {
    pub default_ws: String,
    pub http_base: String,
    /// Topic-prefix routes to alternative endpoints; first match wins.
    pub routes: Vec<(String, String)>,
}

impl MockAdapter {
    pub fn new(default_ws: impl Into<String>) -> Self {
        Self {
            default_ws: default_ws.into(),
            ..Self::default()
        }
    }

    pub fn with_http(http_base: impl Into<String>) -> Self {
        Self {
            http_base: http_base.into(),
            ..Self::default()
        }
    }

    pub fn route(mut self, prefix: impl Into<String>, url: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), url.into()));
        self
    }
}

#[async_trait]
impl VenueAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mockx"
    }

    fn http_base_url(&self) -> String {
        self.http_base.clone()
    }

    fn ws_url(&self, subscriptions: &[Subscription]) -> SessionResult<String> {
        if let Some(first) = subscriptions.first() {
            for (prefix, url) in &self.routes {
                if first.topic().as_str().starts_with(prefix.as_str()) {
                    return Ok(url.clone());
                }
            }
        }
        Ok(self.default_ws.clone())
    }

    fn sign(&self, request: &mut VenueRequest) -> HttpResult<()> {
        request
            .headers
            .insert("X-MOCK-KEY".to_string(), "test-key".to_string());
        request
            .params
            .push(("signature".to_string(), "a1b2c3".to_string()));
        Ok(())
    }

    fn classify_response(
        &self,
        status: u16,
        _headers: &HashMap<String, String>,
        body: &ResponseBody,
    ) -> HttpResult<()> {
        if status >= 400 {
            let body = match body {
                ResponseBody::Json(value) => value.to_string(),
                ResponseBody::Text(text) => text.clone(),
                ResponseBody::Empty => String::new(),
            };
            return Err(HttpError::UnexpectedStatus { status, body });
        }
        if let Some(value) = body.as_json()
            && value.get("error").and_then(Value::as_bool) == Some(true)
        {
            return Err(HttpError::Venue {
                code: value
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(())
    }

    fn auth_message(&self) -> SessionResult<Option<String>> {
        Ok(Some(json!({"op": "login", "key": "test-key"}).to_string()))
    }

    fn control_message(&self, op: ControlOp, payloads: &[Value]) -> SessionResult<String> {
        Ok(json!({"op": op.to_string(), "args": payloads}).to_string())
    }

    fn classify_inbound(&self, text: &str) -> SessionResult<InboundMessage> {
        let value: Value = serde_json::from_str(text)?;
        if let Some(topic) = value.get("topic").and_then(Value::as_str) {
            return Ok(InboundMessage::Data {
                topic: Ustr::from(topic),
                payload: value.get("data").cloned().unwrap_or(Value::Null),
            });
        }
        match value.get("event").and_then(Value::as_str) {
            Some("login") => {
                if value.get("code").and_then(Value::as_str) == Some("0") {
                    Ok(InboundMessage::AuthAccepted)
                } else {
                    Ok(InboundMessage::AuthRejected(
                        value
                            .get("msg")
                            .and_then(Value::as_str)
                            .unwrap_or("login rejected")
                            .to_string(),
                    ))
                }
            }
            Some("reconnect") => Ok(InboundMessage::ReconnectRequest(
                "server requested reconnect".to_string(),
            )),
            _ => Ok(InboundMessage::Control),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Subscription spec
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct TestSpec {
    pub channel: String,
    pub symbol: String,
    pub auth: bool,
    pub supports_unsub: bool,
    pub init_calls: AtomicUsize,
}

impl TestSpec {
    pub fn new(channel: &str, symbol: &str) -> Self {
        Self {
            channel: channel.to_string(),
            symbol: symbol.to_string(),
            auth: false,
            supports_unsub: true,
            init_calls: AtomicUsize::new(0),
        }
    }

    pub fn private(channel: &str, symbol: &str) -> Self {
        Self {
            auth: true,
            ..Self::new(channel, symbol)
        }
    }

    pub fn without_unsub(channel: &str, symbol: &str) -> Self {
        Self {
            supports_unsub: false,
            ..Self::new(channel, symbol)
        }
    }
}

#[async_trait]
impl SubscriptionSpec for TestSpec {
    fn topic(&self) -> String {
        format!("{}:{}", self.channel, self.symbol)
    }

    fn subscribe_payload(&self) -> Value {
        json!({"channel": self.channel, "symbol": self.symbol})
    }

    fn unsubscribe_payload(&self) -> Option<Value> {
        self.supports_unsub
            .then(|| json!({"channel": self.channel, "symbol": self.symbol}))
    }

    fn requires_auth(&self) -> bool {
        self.auth
    }

    async fn initialize(&self) -> SessionResult<()> {
        self.init_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A callback that stores each payload it receives.
pub fn collector_callback() -> (StreamCallback, Arc<Mutex<Vec<Value>>>) {
    let store = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&store);
    let callback: StreamCallback = Arc::new(move |payload, _reply| {
        let inner = Arc::clone(&inner);
        Box::pin(async move {
            inner.lock().unwrap().push(payload);
        })
    });
    (callback, store)
}

// ------------------------------------------------------------------------------------------------
// Mock WebSocket server
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct WsServerState {
    pub connections: Arc<AtomicUsize>,
    pub disconnects: Arc<AtomicUsize>,
    /// All client texts as (connection index, text).
    pub received: Arc<Mutex<Vec<(usize, String)>>>,
    /// Reject the next login attempts with a non-zero code.
    pub reject_auth: Arc<AtomicBool>,
    /// Close this many connections right after confirming their subscribe.
    pub close_after_subscribe: Arc<AtomicUsize>,
    /// Raw server → client messages pushed after confirming a subscribe.
    pub push_after_subscribe: Arc<Mutex<Vec<String>>>,
}

impl WsServerState {
    /// Returns the subscribe control messages observed per connection.
    pub fn subscribes_by_connection(&self) -> HashMap<usize, Vec<Value>> {
        let mut out: HashMap<usize, Vec<Value>> = HashMap::new();
        for (conn, text) in self.received.lock().unwrap().iter() {
            if let Ok(value) = serde_json::from_str::<Value>(text)
                && value.get("op").and_then(Value::as_str) == Some("subscribe")
            {
                out.entry(*conn).or_default().push(value);
            }
        }
        out
    }

    pub fn ops(&self, op: &str) -> Vec<Value> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, text)| serde_json::from_str::<Value>(text).ok())
            .filter(|value| value.get("op").and_then(Value::as_str) == Some(op))
            .collect()
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: WsServerState) {
    let conn = state.connections.fetch_add(1, Ordering::SeqCst);

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        state.received.lock().unwrap().push((conn, text.clone()));

        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        match value.get("op").and_then(Value::as_str) {
            Some("login") => {
                let code = if state.reject_auth.load(Ordering::SeqCst) {
                    "1"
                } else {
                    "0"
                };
                let reply = json!({"event": "login", "code": code, "msg": "auth"}).to_string();
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Some("subscribe") => {
                let reply = json!({"event": "subscribed"}).to_string();
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
                let pushes: Vec<String> = state.push_after_subscribe.lock().unwrap().clone();
                for push in pushes {
                    if socket.send(Message::Text(push.into())).await.is_err() {
                        break;
                    }
                }
                let remaining = state.close_after_subscribe.load(Ordering::SeqCst);
                if remaining > 0 {
                    state
                        .close_after_subscribe
                        .store(remaining - 1, Ordering::SeqCst);
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            Some("unsubscribe") => {
                let reply = json!({"event": "unsubscribed"}).to_string();
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Some("echo") => {
                let reply = json!({
                    "topic": value.get("topic").cloned().unwrap_or(Value::Null),
                    "data": value.get("data").cloned().unwrap_or(Value::Null),
                })
                .to_string();
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            _ => {}
        }
    }

    state.disconnects.fetch_add(1, Ordering::SeqCst);
}

/// Spawns the mock WebSocket server, returning its bound address.
pub async fn spawn_ws_server(state: WsServerState) -> SocketAddr {
    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock server");
    });
    addr
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

// ------------------------------------------------------------------------------------------------
// Async assertions
// ------------------------------------------------------------------------------------------------

/// Polls `condition` until it holds or the timeout expires.
pub async fn wait_until(condition: impl Fn() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
