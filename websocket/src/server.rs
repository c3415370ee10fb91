//! WebSocket route attached to the broadcast hub.
//!
//! Every accepted connection becomes one hub subscription. A single writer
//! task owns the socket's send half and drains two queues: hub events and
//! direct replies (pong / error). Each socket write is bounded by
//! `send_timeout`; a connection that cannot keep up is closed, which drops
//! its queue and lets the hub evict it on the next publish.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use ballot_types::Snapshot;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::{ClientMessage, HubEvent, ServerMessage};
use crate::hub::{BroadcastHub, DeliveryFailure, Subscription};

/// Path the stream is served on.
pub const WS_PATH: &str = "/api/voting/ws";

/// Default bound on a single socket write.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplies the snapshot a newly connected observer starts from.
///
/// Called on the blocking pool, so implementations may read storage.
pub trait SnapshotSource: Send + Sync + 'static {
    /// `None` when the current state cannot be read (e.g. storage outage).
    fn snapshot(&self) -> Option<Snapshot>;
}

/// Shared state for the WebSocket route.
pub struct WsState {
    pub hub: Arc<BroadcastHub>,
    pub status: Arc<dyn SnapshotSource>,
    pub send_timeout: Duration,
}

impl WsState {
    pub fn new(hub: Arc<BroadcastHub>, status: Arc<dyn SnapshotSource>) -> Self {
        Self {
            hub,
            status,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }
}

/// Router serving the event stream at [`WS_PATH`].
pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route(WS_PATH, get(ws_handler))
        .with_state(state)
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let Subscription { id, events } = state.hub.subscribe();
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMessage>(8);

    let status = Arc::clone(&state.status);
    let initial = match tokio::task::spawn_blocking(move || status.snapshot()).await {
        Ok(snapshot) => snapshot.map(HubEvent::vote_update),
        Err(e) => {
            warn!(subscriber = id, error = %e, "initial snapshot task failed");
            None
        }
    };
    let mut writer = tokio::spawn(write_loop(
        ws_sender,
        events,
        reply_rx,
        initial,
        state.send_timeout,
    ));

    debug!(subscriber = id, "WebSocket client connected");

    let reader = async {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(subscriber = id, "WebSocket receive error: {}", e);
                    break;
                }
            };
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => ServerMessage::Pong,
                        Err(e) => ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        },
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    debug!(subscriber = id, "client sent close frame");
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = &mut writer => {}
        _ = reader => {}
    }

    writer.abort();
    state.hub.unsubscribe(id);
    debug!(subscriber = id, "WebSocket client disconnected");
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<Arc<HubEvent>>,
    mut replies: mpsc::Receiver<ServerMessage>,
    initial: Option<HubEvent>,
    send_timeout: Duration,
) {
    if let Some(event) = initial {
        if send_json(&mut sender, &event, send_timeout).await.is_err() {
            return;
        }
    }

    loop {
        let sent = tokio::select! {
            event = events.recv() => match event {
                Some(event) => send_json(&mut sender, event.as_ref(), send_timeout).await,
                // Evicted by the hub.
                None => break,
            },
            reply = replies.recv() => match reply {
                Some(reply) => send_json(&mut sender, &reply, send_timeout).await,
                None => break,
            },
        };
        if sent.is_err() {
            break;
        }
    }

    let _ = sender.close().await;
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
    send_timeout: Duration,
) -> Result<(), DeliveryFailure> {
    let text = match serde_json::to_string(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!("failed to encode WebSocket payload: {}", e);
            return Ok(());
        }
    };
    match tokio::time::timeout(send_timeout, sender.send(Message::Text(text))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!("WebSocket send failed: {}", e);
            Err(DeliveryFailure::Disconnected)
        }
        Err(_) => {
            warn!(timeout_ms = send_timeout.as_millis() as u64, "WebSocket send timed out, dropping client");
            Err(DeliveryFailure::TimedOut)
        }
    }
}
