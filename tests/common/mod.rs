#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, Request};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use guidebook::config::Config;
use guidebook::middleware::auth::issue_token;
use guidebook::middleware::route_guard::GuardConfig;
use guidebook::models::identity::{Identity, Role};
use guidebook::realtime::transport::OutboundEvent;
use guidebook::realtime::{
    ConnectParams, Connection, Connector, Emitter, EventSink, RealtimeSettings, ReconnectPolicy,
    TransportEvent, TransportMode,
};
use guidebook::routes;
use guidebook::state::AppState;
use http::{Method, Request as HttpRequest};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const SECRET: &str = "edge-test-secret";

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Await `fut`, failing the test after a few seconds.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

pub fn peers(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub fn settings(endpoint: &str) -> RealtimeSettings {
    RealtimeSettings {
        endpoint: endpoint.to_string(),
        transport: TransportMode::WebSocket,
        reconnect: fast_reconnect(),
    }
}

pub fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_attempts: None,
        jitter: false,
    }
}

// ---------------------------------------------------------------------------
// Fake transport
// ---------------------------------------------------------------------------

pub struct FakeOpened {
    pub params: ConnectParams,
    pub sink: EventSink,
    pub closed: Arc<AtomicBool>,
    pub outbound: mpsc::UnboundedReceiver<OutboundEvent>,
}

/// Connector that records every open and lets the test push events.
#[derive(Clone, Default)]
pub struct FakeConnector {
    opened: Arc<Mutex<Vec<FakeOpened>>>,
}

struct FakeConnection {
    closed: Arc<AtomicBool>,
    emitter: Emitter,
}

impl Connection for FakeConnection {
    fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Connector for FakeConnector {
    fn open(&self, params: ConnectParams, sink: EventSink) -> Box<dyn Connection> {
        let closed = Arc::new(AtomicBool::new(false));
        let (emitter, outbound) = Emitter::channel();
        self.opened.lock().unwrap().push(FakeOpened {
            params,
            sink,
            closed: closed.clone(),
            outbound,
        });
        Box::new(FakeConnection { closed, emitter })
    }
}

impl FakeConnector {
    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn params(&self, i: usize) -> ConnectParams {
        self.opened.lock().unwrap()[i].params.clone()
    }

    pub fn is_closed(&self, i: usize) -> bool {
        self.opened.lock().unwrap()[i].closed.load(Ordering::SeqCst)
    }

    pub fn push(&self, i: usize, event: TransportEvent) {
        let sink = self.opened.lock().unwrap()[i].sink.clone();
        assert!(sink.send(event), "manager is gone");
    }

    pub fn push_peers(&self, i: usize, ids: &[&str]) {
        self.push(i, TransportEvent::OnlinePeers(peers(ids)));
    }

    pub fn try_outbound(&self, i: usize) -> Option<OutboundEvent> {
        self.opened.lock().unwrap()[i].outbound.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Local realtime server
// ---------------------------------------------------------------------------

pub enum HubCommand {
    Send(String),
    /// Drop the socket without a close handshake.
    Drop,
}

/// One client connection accepted by the hub.
pub struct HubConnection {
    pub query: HashMap<String, String>,
    pub commands: mpsc::UnboundedSender<HubCommand>,
    pub inbound: mpsc::UnboundedReceiver<String>,
    /// Resolves (with an error) once the server side of the socket is gone.
    pub closed: oneshot::Receiver<()>,
}

impl HubConnection {
    pub fn push_peers(&self, ids: &[&str]) {
        let frame = serde_json::json!({ "event": "getOnlineUsers", "data": ids });
        self.commands
            .send(HubCommand::Send(frame.to_string()))
            .unwrap();
    }

    pub fn send_raw(&self, frame: &str) {
        self.commands
            .send(HubCommand::Send(frame.to_string()))
            .unwrap();
    }

    pub fn drop_socket(&self) {
        self.commands.send(HubCommand::Drop).unwrap();
    }
}

pub struct RealtimeHub {
    pub url: String,
    connections: mpsc::UnboundedReceiver<HubConnection>,
}

impl RealtimeHub {
    pub async fn spawn() -> Self {
        let (conn_tx, connections) = mpsc::unbounded_channel::<HubConnection>();
        let app = Router::new().route(
            "/realtime",
            get(
                move |ws: WebSocketUpgrade, Query(query): Query<HashMap<String, String>>| {
                    let conn_tx = conn_tx.clone();
                    async move {
                        ws.on_upgrade(move |socket| hub_socket(socket, query, conn_tx))
                    }
                },
            ),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("ws://127.0.0.1:{}/realtime", addr.port()),
            connections,
        }
    }

    pub async fn next_connection(&mut self) -> HubConnection {
        within(self.connections.recv())
            .await
            .expect("hub stopped")
    }
}

async fn hub_socket(
    mut socket: WebSocket,
    query: HashMap<String, String>,
    conn_tx: mpsc::UnboundedSender<HubConnection>,
) {
    let (commands, mut command_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (_closed_tx, closed) = oneshot::channel::<()>();
    if conn_tx
        .send(HubConnection {
            query,
            commands,
            inbound,
            closed,
        })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(HubCommand::Send(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Some(HubCommand::Drop) | None => return,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound_tx.send(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Edge server
// ---------------------------------------------------------------------------

/// Upstream page renderer stand-in that echoes what it received.
async fn echo(req: Request) -> Json<serde_json::Value> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    Json(serde_json::json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "cookie": parts.headers.get("cookie").and_then(|v| v.to_str().ok()),
        "authorization": parts.headers.get("authorization").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&bytes),
    }))
}

/// Login form handler of the page renderer: sets the session cookie and
/// sends the browser on.
async fn login_redirect() -> Response {
    Response::builder()
        .status(http::StatusCode::FOUND)
        .header("location", "/user/home")
        .header("set-cookie", "token=abc; Path=/; HttpOnly")
        .header("set-cookie", "lang=en; Path=/")
        .body(Body::empty())
        .unwrap()
}

pub async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/login", post(login_redirect))
        .fallback(echo);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", addr.port())
}

/// A port nothing listens on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub struct TestEdge {
    pub state: AppState,
}

impl TestEdge {
    pub fn with_upstream(upstream_url: &str) -> Self {
        let config = Config {
            port: 0,
            upstream_url: upstream_url.to_string(),
            jwt_secret: SECRET.to_string(),
            token_cookie: "token".to_string(),
            guard: GuardConfig::default(),
            realtime: settings("ws://127.0.0.1:1/realtime"),
        };
        Self {
            state: AppState::from_config(&config),
        }
    }

    pub async fn new() -> Self {
        Self::with_upstream(&spawn_upstream().await)
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }
}

pub fn token_for(id: &str, role: Role) -> String {
    issue_token(
        &Identity::new(id, role),
        SECRET,
        chrono::Duration::hours(1),
    )
    .unwrap()
}

pub fn expired_token_for(id: &str, role: Role) -> String {
    issue_token(
        &Identity::new(id, role),
        SECRET,
        chrono::Duration::hours(-2),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

pub fn request(method: Method, uri: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn bearer_request(method: Method, uri: &str, token: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn cookie_request(method: Method, uri: &str, token: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header("Cookie", format!("lang=en; token={token}"))
        .body(Body::empty())
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
