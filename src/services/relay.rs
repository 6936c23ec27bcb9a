//! Event relay: binds sessions to rooms, applies mutations, fans out.
//!
//! DESIGN
//! ======
//! Each inbound frame becomes an [`Event`] and is handled in one of four ways:
//!
//! | Event | Room state | Fan-out | Reply to sender |
//! |-------|-----------|---------|-----------------|
//! | `Join` | subscribe, presence join | `presence:join` to peers | snapshot (`done`) |
//! | `Mutation` | applied | original payload to peers | none |
//! | `Cursor` / `Viewport` | presence only | stamped payload to peers | none |
//! | `Undo` / `Redo` | untouched | bare notification to peers | none |
//!
//! Apply and fan-out happen under one registry write guard, so no other
//! message can land between a mutation reaching the room and reaching the
//! peers. Relayed frames carry the room's `board_id` and the sender's session
//! id in `from`; nothing is ever echoed to the sender.
//!
//! Frames from a session that has not joined are refused with
//! [`RelayError::Unbound`]. The websocket layer logs every error and sends
//! nothing back.

use frames::{Event, EventError, Frame, Identity, Mutation};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::session::Session;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("session has not joined a board")]
    Unbound,
    #[error("{0} is not accepted from clients")]
    NotAccepted(&'static str),
}

/// Handle one inbound frame and return the frames owed to the sender.
///
/// # Errors
///
/// Returns [`RelayError`] if the frame is not a valid client event or the
/// session has not joined a board. Room state is untouched in that case.
pub async fn handle(
    state: &AppState,
    session: &mut Session,
    tx: &mpsc::Sender<Frame>,
    frame: &Frame,
) -> Result<Vec<Frame>, RelayError> {
    match Event::from_frame(frame)? {
        Event::Join { board_id, identity } => {
            let snapshot = join(state, session, board_id, identity, tx.clone()).await;
            let mut reply = frame.done_with(snapshot.to_data());
            reply.board_id = session.board_id().map(str::to_owned);
            Ok(vec![reply])
        }
        Event::Mutation(mutation) => {
            mutate(state, session, &mutation, frame).await?;
            Ok(Vec::new())
        }
        event @ (Event::Cursor(_) | Event::Viewport(_)) => {
            relay_presence(state, session, event).await?;
            Ok(Vec::new())
        }
        event @ (Event::Undo | Event::Redo) => {
            relay_history(state, session, &event).await?;
            Ok(Vec::new())
        }
        other => Err(RelayError::NotAccepted(other.syscall())),
    }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Bind `session` to a board and return its snapshot.
///
/// A session already bound elsewhere parts that room first. A missing board
/// id means the configured default board; a missing identity means a guest.
pub async fn join(
    state: &AppState,
    session: &mut Session,
    board_id: Option<String>,
    identity: Option<Identity>,
    tx: mpsc::Sender<Frame>,
) -> Event {
    if session.board_id().is_some() {
        part(state, session).await;
    }

    let board_id = board_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| state.config.default_board_id.clone());
    let identity = identity.unwrap_or_else(|| Identity::guest(session.id.to_string()));

    let mut rooms = state.rooms.write().await;
    let room = rooms.get_or_create(&board_id);
    room.subscribe(session.id, tx);
    let announce = room.presence.join(session.id, identity.clone());
    room.publish(&stamp(announce.to_frame(), &board_id, session.id), Some(session.id));
    let shapes = room.state.snapshot();
    info!(%board_id, session_id = %session.id, participants = room.presence.len(), shapes = shapes.len(), "relay: session joined board");
    drop(rooms);

    session.bind(board_id.clone(), identity);
    Event::Snapshot { board_id, shapes }
}

/// Unbind `session` and announce its departure. Shapes it created stay.
pub async fn part(state: &AppState, session: &mut Session) {
    let Some(board_id) = session.board_id().map(str::to_owned) else {
        return;
    };
    session.unbind();

    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&board_id) else {
        return;
    };
    room.unsubscribe(session.id);
    if let Some(leave) = room.presence.leave(session.id) {
        room.publish(&stamp(leave.to_frame(), &board_id, session.id), None);
    }
    info!(%board_id, session_id = %session.id, remaining = room.subscribers.len(), "relay: session left board");
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Apply `mutation` to the session's room, then relay `frame`'s payload
/// unchanged to every other subscriber. Returns how many shapes changed.
///
/// # Errors
///
/// Returns [`RelayError::Unbound`] if the session has not joined a board.
pub async fn mutate(
    state: &AppState,
    session: &Session,
    mutation: &Mutation,
    frame: &Frame,
) -> Result<usize, RelayError> {
    let board_id = session.board_id().ok_or(RelayError::Unbound)?;
    let relayed = stamp(Frame::request(frame.syscall.clone(), frame.data.clone()), board_id, session.id);

    let mut rooms = state.rooms.write().await;
    let room = rooms.get_or_create(board_id);
    let touched = room.state.apply(mutation);
    let delivered = room.publish(&relayed, Some(session.id));
    debug!(%board_id, session_id = %session.id, syscall = %frame.syscall, touched, delivered, shapes = room.state.len(), "relay: mutation applied");
    Ok(touched)
}

// =============================================================================
// PRESENCE / HISTORY
// =============================================================================

/// Relay a cursor or viewport update stamped with the sender's session id.
///
/// # Errors
///
/// Returns [`RelayError::Unbound`] if the session has not joined a board and
/// [`RelayError::NotAccepted`] for events that are not presence updates.
pub async fn relay_presence(state: &AppState, session: &Session, event: Event) -> Result<(), RelayError> {
    let board_id = session.board_id().ok_or(RelayError::Unbound)?;

    let mut rooms = state.rooms.write().await;
    let room = rooms.get_or_create(board_id);
    let stamped = match event {
        Event::Cursor(cursor) => room.presence.update_cursor(session.id, cursor),
        Event::Viewport(viewport) => room.presence.update_viewport(session.id, viewport),
        other => return Err(RelayError::NotAccepted(other.syscall())),
    };
    let Some(stamped) = stamped else {
        return Err(RelayError::Unbound);
    };
    room.publish(&stamp(stamped.to_frame(), board_id, session.id), Some(session.id));
    Ok(())
}

/// Tell peers the sender undid or redid locally. Nothing is applied here.
///
/// # Errors
///
/// Returns [`RelayError::Unbound`] if the session has not joined a board.
pub async fn relay_history(state: &AppState, session: &Session, event: &Event) -> Result<(), RelayError> {
    let board_id = session.board_id().ok_or(RelayError::Unbound)?;

    let mut rooms = state.rooms.write().await;
    if let Some(room) = rooms.get_mut(board_id) {
        room.publish(&stamp(event.to_frame(), board_id, session.id), Some(session.id));
    }
    Ok(())
}

/// Tag a relayed frame with its room and the session it came from.
pub(crate) fn stamp(frame: Frame, board_id: &str, session_id: Uuid) -> Frame {
    frame.with_board_id(board_id).with_from(session_id.to_string())
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
