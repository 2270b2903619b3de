//! HTTP/SSE MCP transport with POST-back.
//!
//! - `GET /sse` opens the event stream: the server assigns a fresh client
//!   id, creates an isolated session, and immediately emits an
//!   `event: endpoint` whose data is the absolute POST-back URL. All later
//!   server→client messages arrive as `event: message` frames.
//! - `POST /message?clientId=<id>` accepts one JSON-RPC message for the
//!   named session: `202` on acceptance, `400` on invalid JSON, `404` on
//!   an unknown id.
//! - `GET /health` reports `{status:"ok", clients:N}`.
//! - CORS is wide open (`*`), preflights included.
//!
//! Closing the SSE connection tears the session down; an in-flight
//! handler completes but its reply is discarded.

use crate::protocol::{JsonRpcNotification, JsonRpcRequest};
use crate::session::McpSession;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use host_core::{ClientId, Error, Result};
use host_dispatch::ToolDispatcher;
use host_plugin::PluginManager;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// How long [`SseServerHandle::stop`] waits for live connections.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

struct SessionEntry {
    inbound: mpsc::UnboundedSender<JsonRpcRequest>,
    outbound: mpsc::UnboundedSender<Event>,
}

struct SseState {
    manager: Arc<PluginManager>,
    dispatcher: Arc<ToolDispatcher>,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    fallback_host: String,
}

impl SseState {
    fn client_count(&self) -> usize {
        self.sessions.lock().expect("session map lock poisoned").len()
    }
}

/// Running SSE listener. Dropping the handle leaves the server running;
/// call [`Self::stop`] to shut it down.
#[derive(Debug)]
pub struct SseServerHandle {
    port: u16,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
    notifier: JoinHandle<()>,
}

impl SseServerHandle {
    /// Port the listener is bound to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting connections and waits for the listener to finish.
    ///
    /// Live SSE streams hold their connections open indefinitely, so the
    /// graceful drain is bounded; stragglers are aborted.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        self.notifier.abort();

        let mut server = self.server;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server)
            .await
            .is_err()
        {
            server.abort();
        }
        tracing::info!("SSE transport stopped");
    }
}

/// Binds the SSE transport on `port` and serves it in the background.
///
/// Binding happens before this function returns, so port conflicts
/// surface immediately.
///
/// # Errors
///
/// Returns [`Error::Io`] when the port cannot be bound.
pub async fn spawn_sse(
    manager: Arc<PluginManager>,
    dispatcher: Arc<ToolDispatcher>,
    port: u16,
) -> Result<SseServerHandle> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
        .await
        .map_err(|e| Error::Io {
            context: format!("binding port {port}"),
            source: e,
        })?;
    let local = listener.local_addr().map_err(|e| Error::Io {
        context: "resolving local address".to_string(),
        source: e,
    })?;

    let state = Arc::new(SseState {
        manager,
        dispatcher,
        sessions: Mutex::new(HashMap::new()),
        fallback_host: format!("127.0.0.1:{}", local.port()),
    });

    let notifier = spawn_notifier(Arc::clone(&state));
    let app = router(state);

    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        let signal = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
        {
            tracing::error!("SSE server error: {e}");
        }
    });

    tracing::info!("SSE transport listening on http://{local}");
    Ok(SseServerHandle {
        port: local.port(),
        shutdown,
        server,
        notifier,
    })
}

fn router(state: Arc<SseState>) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Creates a session, its worker, and its channels; registers it in the
/// session map.
fn register_session(state: &Arc<SseState>) -> (Uuid, mpsc::UnboundedReceiver<Event>) {
    let client_id = Uuid::new_v4();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    let session = McpSession::new(
        ClientId::new(client_id.to_string()),
        Arc::clone(&state.manager),
        Arc::clone(&state.dispatcher),
    );
    spawn_session_worker(session, in_rx, out_tx.clone());

    state
        .sessions
        .lock()
        .expect("session map lock poisoned")
        .insert(
            client_id,
            SessionEntry {
                inbound: in_tx,
                outbound: out_tx,
            },
        );

    (client_id, out_rx)
}

/// Processes one session's inbound queue serially, in arrival order.
fn spawn_session_worker(
    session: McpSession,
    mut inbound: mpsc::UnboundedReceiver<JsonRpcRequest>,
    outbound: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        while let Some(request) = inbound.recv().await {
            if let Some(response) = session.handle_request(request).await {
                let event = Event::default().event("message").data(response.to_line());
                if outbound.send(event).is_err() {
                    // Peer left mid-request; the reply is discarded.
                    break;
                }
            }
        }
    });
}

/// Pushes `tools/list_changed` to every live session on plugin events.
fn spawn_notifier(state: Arc<SseState>) -> JoinHandle<()> {
    let mut events = state.manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {skipped} plugin events; notifying anyway");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }

            let line = JsonRpcNotification::tools_list_changed().to_line();
            let sessions = state.sessions.lock().expect("session map lock poisoned");
            for entry in sessions.values() {
                let _ = entry
                    .outbound
                    .send(Event::default().event("message").data(line.clone()));
            }
        }
    })
}

async fn sse_handler(
    State(state): State<Arc<SseState>>,
    headers: HeaderMap,
) -> Sse<axum::response::sse::KeepAliveStream<SessionStream>> {
    let (client_id, out_rx) = register_session(&state);
    tracing::info!("SSE client connected: {client_id}");

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(&state.fallback_host);
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("http://{host}/message?clientId={client_id}"));

    let stream = SessionStream {
        endpoint: Some(endpoint),
        messages: UnboundedReceiverStream::new(out_rx),
        _guard: SessionGuard {
            state: Arc::clone(&state),
            client_id,
        },
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

async fn message_handler(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(client_id) = query
        .client_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
    else {
        return (StatusCode::NOT_FOUND, "unknown client").into_response();
    };

    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid JSON").into_response(),
    };

    let delivered = {
        let sessions = state.sessions.lock().expect("session map lock poisoned");
        sessions
            .get(&client_id)
            .map(|entry| entry.inbound.send(request).is_ok())
    };

    match delivered {
        Some(true) => StatusCode::ACCEPTED.into_response(),
        _ => (StatusCode::NOT_FOUND, "unknown client").into_response(),
    }
}

async fn health_handler(State(state): State<Arc<SseState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "clients": state.client_count(),
    }))
}

/// Event stream for one SSE client: the endpoint event first, then
/// forwarded messages. Dropping the stream (client disconnect) removes
/// the session.
struct SessionStream {
    endpoint: Option<Event>,
    messages: UnboundedReceiverStream<Event>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = std::result::Result<Event, std::convert::Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.endpoint.take() {
            return Poll::Ready(Some(Ok(event)));
        }
        Pin::new(&mut this.messages)
            .poll_next(cx)
            .map(|next| next.map(Ok))
    }
}

struct SessionGuard {
    state: Arc<SseState>,
    client_id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state
            .sessions
            .lock()
            .expect("session map lock poisoned")
            .remove(&self.client_id);
        tracing::info!("SSE client disconnected: {}", self.client_id);
    }
}
