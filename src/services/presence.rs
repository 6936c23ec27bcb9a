//! Who is in a room and where they are looking.
//!
//! Each operation returns the event the relay should broadcast, already
//! stamped with the participant's session id. Entries are never replayed to
//! newcomers: someone who joins sees an existing participant only after that
//! participant's next cursor or viewport update. The tracker holds identities
//! only; the last cursor and viewport of each peer live in the receiving
//! mirrors.

use std::collections::HashMap;

use frames::{Cursor, Event, Identity, Viewport};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: HashMap<Uuid, Identity>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant. Joining twice refreshes the identity.
    pub fn join(&mut self, session_id: Uuid, identity: Identity) -> Event {
        self.entries.insert(session_id, identity.clone());
        Event::PresenceJoin { session_id: session_id.to_string(), identity }
    }

    /// Unregister a participant. Only the first call yields an event.
    pub fn leave(&mut self, session_id: Uuid) -> Option<Event> {
        self.entries.remove(&session_id)?;
        Some(Event::PresenceLeave { session_id: session_id.to_string() })
    }

    /// Stamp a cursor move. `None` if the session has not joined.
    #[must_use]
    pub fn update_cursor(&self, session_id: Uuid, cursor: Cursor) -> Option<Event> {
        let identity = self.entries.get(&session_id)?;
        Some(Event::Cursor(Cursor {
            session_id: Some(session_id.to_string()),
            color: cursor.color.or_else(|| Some(identity.color.clone())),
            x: cursor.x,
            y: cursor.y,
        }))
    }

    /// Stamp a viewport change. `None` if the session has not joined.
    #[must_use]
    pub fn update_viewport(&self, session_id: Uuid, viewport: Viewport) -> Option<Event> {
        if !self.entries.contains_key(&session_id) {
            return None;
        }
        Some(Event::Viewport(Viewport { session_id: Some(session_id.to_string()), ..viewport }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
