use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use cistatus_common::Summary;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::api::SharedState;
use super::hub::Hub;

/// How long to wait for a Pong before considering the connection dead.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send Ping frames. Must be shorter than [`PONG_WAIT`].
pub const PING_INTERVAL: Duration = Duration::from_secs(40);

/// Deadline for any single frame write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Heartbeat timing for watch sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    pub ping_interval: Duration,
    pub pong_wait: Duration,
    pub write_wait: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            pong_wait: PONG_WAIT,
            write_wait: WRITE_WAIT,
        }
    }
}

/// Why a watch socket's writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The hub dropped this subscriber (queue overflow or unregister).
    Unsubscribed,
    PeerClosed,
    PongTimeout,
    WriteFailed,
    ReadFailed,
}

pub async fn watch_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let keepalive = state.keepalive;
    ws.on_upgrade(move |socket| handle_socket(socket, hub, keepalive))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, keepalive: Keepalive) {
    let subscription = hub.register();
    let id = subscription.id;
    let (sender, receiver) = socket.split();

    let reason = run_socket_loop(sender, receiver, subscription.rx, keepalive).await;

    hub.unregister(id);
    tracing::debug!(subscriber = %id, reason = ?reason, "watch socket closed");
}

/// Per-subscriber writer with ping/pong keepalive.
///
/// Drains this subscriber's own queue onto the socket, sends a Ping every
/// `ping_interval` and watches for Pongs. Nothing here is shared with
/// other subscribers, so a slow peer only ever stalls itself.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: mpsc::Receiver<Summary>,
    keepalive: Keepalive,
) -> Disconnect {
    let mut ping_interval = tokio::time::interval(keepalive.ping_interval);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    let reason = loop {
        tokio::select! {
            // ── Periodic ping ───────────────────────────────────────
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > keepalive.pong_wait {
                    break Disconnect::PongTimeout;
                }
                let ping = Message::Ping(Bytes::new());
                if !send_with_deadline(&mut sender, ping, keepalive.write_wait).await {
                    break Disconnect::WriteFailed;
                }
                awaiting_pong = true;
            }

            // ── Queued summaries ────────────────────────────────────
            queued = rx.recv() => {
                let Some(summary) = queued else {
                    break Disconnect::Unsubscribed;
                };
                let json = match serde_json::to_string(&summary) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize summary");
                        continue;
                    }
                };
                let frame = Message::Text(json.into());
                if !send_with_deadline(&mut sender, frame, keepalive.write_wait).await {
                    break Disconnect::WriteFailed;
                }
            }

            // ── Peer frames (pong, close, etc.) ─────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break Disconnect::PeerClosed,
                    Some(Ok(_)) => {
                        // Watchers have nothing to say; ignore Text/Binary/Ping.
                    }
                    Some(Err(_)) => break Disconnect::ReadFailed,
                }
            }
        }
    };

    // Best-effort close frame
    if !matches!(reason, Disconnect::PeerClosed | Disconnect::WriteFailed) {
        let _ = send_with_deadline(&mut sender, Message::Close(None), keepalive.write_wait).await;
    }
    reason
}

async fn send_with_deadline(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    deadline: Duration,
) -> bool {
    matches!(
        tokio::time::timeout(deadline, sender.send(msg)).await,
        Ok(Ok(()))
    )
}
