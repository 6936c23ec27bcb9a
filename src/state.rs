//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the configuration and the room registry. Each room owns its
//! authoritative shapes, its presence tracker, and the outbound channels of
//! the sessions subscribed to it.
//!
//! The registry is a single `RwLock`. A mutation's apply and its fan-out run
//! under one write guard, so peers observe mutations in exactly the order the
//! room applied them. A subscriber too slow to take a shape frame is evicted
//! rather than left holding a diverged copy; it reconnects for a fresh
//! snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use frames::Frame;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, mpsc};
use tracing::warn;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::services::presence::PresenceTracker;
use crate::services::relay;
use crate::services::room::RoomState;

const PRESENCE_PREFIX: &str = "presence";

// =============================================================================
// ROOM
// =============================================================================

/// One live board.
pub struct Room {
    pub state: RoomState,
    pub presence: PresenceTracker,
    /// Connected sessions: `session_id` -> sender for outgoing frames.
    pub subscribers: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// When the last subscriber left, or when the room was created empty.
    pub idle_since: Option<Instant>,
}

impl Room {
    #[must_use]
    pub fn new(board_id: impl Into<String>) -> Self {
        Self {
            state: RoomState::new(board_id),
            presence: PresenceTracker::new(),
            subscribers: HashMap::new(),
            idle_since: Some(Instant::now()),
        }
    }

    pub fn subscribe(&mut self, session_id: Uuid, tx: mpsc::Sender<Frame>) {
        self.subscribers.insert(session_id, tx);
        self.idle_since = None;
    }

    /// Returns false if the session was not subscribed.
    pub fn unsubscribe(&mut self, session_id: Uuid) -> bool {
        let removed = self.subscribers.remove(&session_id).is_some();
        if self.subscribers.is_empty() && self.idle_since.is_none() {
            self.idle_since = Some(Instant::now());
        }
        removed
    }

    /// Queue `frame` for every subscriber except `exclude`. Returns how many
    /// accepted it.
    ///
    /// Presence frames are at-most-once: a full queue just misses one. Any
    /// other frame changes what peers must hold, so a subscriber whose queue
    /// is full is evicted instead. Its sender is dropped, which ends the
    /// connection, and the room is told it left.
    pub fn publish(&mut self, frame: &Frame, exclude: Option<Uuid>) -> usize {
        let lossy = frame.prefix() == PRESENCE_PREFIX;
        let mut delivered = 0;
        let mut lagging = Vec::new();
        for (session_id, tx) in &self.subscribers {
            if Some(*session_id) == exclude {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) if lossy => {
                    warn!(board_id = %self.state.board_id(), %session_id, syscall = %frame.syscall, "room: subscriber queue full, frame dropped");
                }
                Err(mpsc::error::TrySendError::Full(_)) => lagging.push(*session_id),
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        for session_id in lagging {
            warn!(board_id = %self.state.board_id(), %session_id, syscall = %frame.syscall, "room: subscriber queue full, evicting");
            self.evict(session_id);
        }
        delivered
    }

    /// Drop a subscriber and announce its departure to the rest of the room.
    fn evict(&mut self, session_id: Uuid) {
        self.unsubscribe(session_id);
        if let Some(leave) = self.presence.leave(session_id) {
            let frame = relay::stamp(leave.to_frame(), self.state.board_id(), session_id);
            self.publish(&frame, None);
        }
    }

    /// True when nobody is subscribed and the room has been idle for `ttl`.
    #[must_use]
    pub fn is_idle_for(&self, ttl: Duration, now: Instant) -> bool {
        self.subscribers.is_empty()
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= ttl)
    }
}

// =============================================================================
// ROOM REGISTRY
// =============================================================================

/// Rooms keyed by board id.
#[derive(Default)]
pub struct Rooms {
    rooms: HashMap<String, Room>,
}

impl Rooms {
    /// Look up a room, creating an empty one if absent. Never fails.
    pub fn get_or_create(&mut self, board_id: &str) -> &mut Room {
        self.rooms
            .entry(board_id.to_owned())
            .or_insert_with(|| Room::new(board_id))
    }

    #[must_use]
    pub fn get(&self, board_id: &str) -> Option<&Room> {
        self.rooms.get(board_id)
    }

    pub fn get_mut(&mut self, board_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(board_id)
    }

    /// Remove rooms that have been idle for at least `ttl`; returns their ids.
    pub fn evict_idle(&mut self, ttl: Duration, now: Instant) -> Vec<String> {
        let doomed: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.is_idle_for(ttl, now))
            .map(|(board_id, _)| board_id.clone())
            .collect();
        for board_id in &doomed {
            self.rooms.remove(board_id);
        }
        doomed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

/// Shared handle to every live room.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<Rooms>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Rooms> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Rooms> {
        self.inner.write().await
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { rooms: RoomRegistry::new(), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
