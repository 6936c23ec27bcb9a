//! WebSocket handler: bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, creates an unbound [`Session`] and enters a `select!` loop:
//! - Incoming client frames → decode → [`relay::handle`] → replies to sender
//! - Frames published by room peers → forward to client
//!
//! Text messages carry JSON frames and binary messages carry protobuf frames.
//! Outbound frames use whichever format the client last sent.
//!
//! Every relay error ends here as a log line; the client never receives an
//! error frame.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `session_id`
//! 2. Client sends `board:join` → snapshot reply, peers get `presence:join`
//! 3. Mutations, presence, and history frames are applied and relayed
//! 4. Close → part the room (peers get `presence:leave`)
//!
//! A room that evicts a lagging subscriber drops its sender; the peer channel
//! then closes and the connection ends. The client reconnects and rejoins for
//! a fresh snapshot.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::{CodecError, Event, Frame};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::relay::{self, RelayError};
use crate::services::session::Session;
use crate::state::AppState;

/// Encoding used for frames sent back to one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum WireFormat {
    #[default]
    Json,
    Protobuf,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let mut session = Session::new();
    let session_id = session.id;
    let mut format = WireFormat::default();

    // Per-connection channel for receiving frames published by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);
    let mut outbox = Outbox::Pending(client_tx);

    let welcome = Event::Connected { session_id: session_id.to_string() }.to_frame();
    if send_frame(&mut socket, format, &welcome).await.is_err() {
        return;
    }

    info!(%session_id, "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let inbound = match msg {
                    Message::Text(text) => {
                        format = WireFormat::Json;
                        frames::decode_json(text.as_str())
                    }
                    Message::Binary(bytes) => {
                        format = WireFormat::Protobuf;
                        frames::decode_frame(&bytes)
                    }
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Some(tx) = outbox.sender() else {
                    info!(%session_id, "ws: evicted from room");
                    break;
                };
                let replies = process_inbound(&state, &mut session, &tx, inbound).await;
                if session.board_id().is_some() {
                    outbox = Outbox::Subscribed(tx.downgrade());
                }
                drop(tx);
                for frame in replies {
                    if send_frame(&mut socket, format, &frame).await.is_err() {
                        break 'conn;
                    }
                }
            }
            frame = client_rx.recv() => {
                // `None` means the room dropped this subscriber.
                let Some(frame) = frame else {
                    info!(%session_id, "ws: evicted from room");
                    break;
                };
                if send_frame(&mut socket, format, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    relay::part(&state, &mut session).await;
    info!(%session_id, "ws: client disconnected");
}

/// This connection's handle on its own outbound channel.
///
/// Before the first join the connection keeps the only sender. Once a room
/// holds one, the connection keeps a weak handle, so a room that drops its
/// sender closes the channel and ends the connection.
enum Outbox {
    Pending(mpsc::Sender<Frame>),
    Subscribed(mpsc::WeakSender<Frame>),
}

impl Outbox {
    fn sender(&self) -> Option<mpsc::Sender<Frame>> {
        match self {
            Self::Pending(tx) => Some(tx.clone()),
            Self::Subscribed(weak) => weak.upgrade(),
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Handle one decoded (or undecodable) inbound message and return frames for
/// the sender. Failures are logged and produce nothing.
async fn process_inbound(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    inbound: Result<Frame, CodecError>,
) -> Vec<Frame> {
    let session_id = session.id;
    let frame = match inbound {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: malformed inbound frame");
            return Vec::new();
        }
    };

    match relay::handle(state, session, client_tx, &frame).await {
        Ok(replies) => replies,
        Err(RelayError::Unbound) => {
            if frame.prefix() != "presence" {
                debug!(%session_id, syscall = %frame.syscall, "ws: dropped frame from unbound session");
            }
            Vec::new()
        }
        Err(e) => {
            warn!(%session_id, syscall = %frame.syscall, error = %e, "ws: dropped invalid frame");
            Vec::new()
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, format: WireFormat, frame: &Frame) -> Result<(), ()> {
    let message = match format {
        WireFormat::Json => match frames::encode_json(frame) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                warn!(error = %e, syscall = %frame.syscall, "ws: failed to serialize frame");
                return Err(());
            }
        },
        WireFormat::Protobuf => Message::Binary(frames::encode_frame(frame).into()),
    };
    socket.send(message).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
