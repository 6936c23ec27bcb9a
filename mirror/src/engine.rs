//! Sync engine: one participant's optimistic mirror of a board.
//!
//! LIFECYCLE
//! =========
//! 1. Host sends [`SyncEngine::join_frame`].
//! 2. Host feeds every inbound frame to [`SyncEngine::receive`]. The
//!    `board:join` reply seeds the local sequence.
//! 3. Local actions apply immediately and return the frame to send. No
//!    round-trip is awaited and nothing is reconciled afterwards: the relay
//!    is the only path remote state takes to reach this mirror.
//!
//! Undo and redo rewrite only this mirror. The notification they emit
//! carries no payload, so peers re-render but keep their own sequence.

use std::collections::HashMap;

use frames::{
    Batch, Cursor, Event, EventError, Frame, Identity, Mutation, Point, Shape, ShapeId, ShapeList, ShapePatch,
    Viewport,
};
use serde::Serialize;
use tracing::debug;

use crate::history::History;

/// What a received frame did to the mirror, so the host knows what to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The relay assigned this connection its session id.
    Session,
    /// The sequence was replaced by a join snapshot.
    Snapshot,
    /// A remote mutation was applied to the sequence.
    Shapes,
    /// A peer's presence changed.
    Presence,
    /// A peer undid or redid locally; redraw, nothing changed here.
    Rerender,
    /// Nothing to do.
    Ignored,
}

/// Another participant in the room, as seen by this mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Peer {
    pub identity: Option<Identity>,
    pub color: Option<String>,
    pub cursor: Option<Point>,
    pub viewport: Option<Viewport>,
}

pub struct SyncEngine {
    board_id: String,
    identity: Identity,
    session_id: Option<String>,
    joined: bool,
    shapes: ShapeList,
    history: History,
    peers: HashMap<String, Peer>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(board_id: impl Into<String>, identity: Identity) -> Self {
        Self {
            board_id: board_id.into(),
            identity,
            session_id: None,
            joined: false,
            shapes: ShapeList::new(),
            history: History::default(),
            peers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = History::new(depth);
        self
    }

    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// True once the join snapshot has arrived.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        self.shapes.as_slice()
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn peers(&self) -> &HashMap<String, Peer> {
        &self.peers
    }

    #[must_use]
    pub fn join_frame(&self) -> Frame {
        Event::Join { board_id: Some(self.board_id.clone()), identity: Some(self.identity.clone()) }.to_frame()
    }

    // =========================================================================
    // LOCAL ACTIONS
    // =========================================================================

    /// Add one shape. `None` if its id is already on the board.
    pub fn add(&mut self, shape: Shape) -> Option<Frame> {
        self.commit_add(Batch::Single(shape))
    }

    /// Add several shapes as one undoable step.
    pub fn add_many(&mut self, shapes: Vec<Shape>) -> Option<Frame> {
        self.commit_add(Batch::Bulk(shapes))
    }

    fn commit_add(&mut self, batch: Batch<Shape>) -> Option<Frame> {
        let before = self.shapes.to_vec();
        if self.shapes.add_all(batch.as_slice().iter().cloned()) == 0 {
            return None;
        }
        self.history.record(before);
        Some(self.outbound(&Event::Mutation(Mutation::Add(batch))))
    }

    /// In-progress edit of a shape being drawn (stroke points, drag-resize).
    /// Not recorded in history: the add that started the gesture already was.
    pub fn preview(&mut self, patch: ShapePatch) -> Option<Frame> {
        if !self.shapes.update(&patch) {
            return None;
        }
        Some(self.outbound(&Event::Mutation(Mutation::Update(Batch::Single(patch)))))
    }

    /// Committed update of existing shapes (layout tidy, property edits).
    pub fn update(&mut self, patches: Vec<ShapePatch>) -> Option<Frame> {
        let before = self.shapes.to_vec();
        if self.shapes.update_all(&patches) == 0 {
            return None;
        }
        self.history.record(before);
        Some(self.outbound(&Event::Mutation(Mutation::Update(Batch::Bulk(patches)))))
    }

    /// Delete shapes by id. `None` if none of them exist.
    pub fn delete(&mut self, ids: Vec<ShapeId>) -> Option<Frame> {
        let before = self.shapes.to_vec();
        if self.shapes.delete(&ids) == 0 {
            return None;
        }
        self.history.record(before);
        Some(self.outbound(&Event::Mutation(Mutation::Delete(ids))))
    }

    /// Remove every shape as one undoable step. `None` if the board is empty.
    pub fn clear(&mut self) -> Option<Frame> {
        let before = self.shapes.to_vec();
        if self.shapes.clear() == 0 {
            return None;
        }
        self.history.record(before);
        Some(self.outbound(&Event::Mutation(Mutation::Clear)))
    }

    /// Roll the local sequence back one step. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Frame> {
        let previous = self.history.undo(self.shapes.to_vec())?;
        self.shapes.replace(previous);
        Some(self.outbound(&Event::Undo))
    }

    /// Re-apply the last undone step. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Frame> {
        let next = self.history.redo(self.shapes.to_vec())?;
        self.shapes.replace(next);
        Some(self.outbound(&Event::Redo))
    }

    #[must_use]
    pub fn cursor(&self, x: f64, y: f64) -> Frame {
        self.outbound(&Event::Cursor(Cursor {
            session_id: self.session_id.clone(),
            color: Some(self.identity.color.clone()),
            x,
            y,
        }))
    }

    #[must_use]
    pub fn viewport(&self, x: f64, y: f64, zoom: f64) -> Frame {
        self.outbound(&Event::Viewport(Viewport { session_id: self.session_id.clone(), x, y, zoom }))
    }

    fn outbound(&self, event: &Event) -> Frame {
        event.to_frame().with_board_id(self.board_id.clone())
    }

    // =========================================================================
    // REMOTE EVENTS
    // =========================================================================

    /// Apply one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if the frame is not a recognizable event; the
    /// mirror is left untouched.
    pub fn receive(&mut self, frame: &Frame) -> Result<Applied, EventError> {
        Ok(self.apply(Event::from_frame(frame)?))
    }

    /// Apply one inbound event. Remote changes never enter local history.
    pub fn apply(&mut self, event: Event) -> Applied {
        match event {
            Event::Connected { session_id } => {
                self.session_id = Some(session_id);
                Applied::Session
            }
            Event::Snapshot { board_id, shapes } => {
                if !board_id.is_empty() {
                    self.board_id = board_id;
                }
                self.shapes.replace(shapes);
                self.history.clear();
                self.peers.clear();
                self.joined = true;
                Applied::Snapshot
            }
            Event::Mutation(mutation) => {
                match mutation {
                    Mutation::Add(batch) => {
                        self.shapes.add_all(batch.into_vec());
                    }
                    Mutation::Update(batch) => {
                        self.shapes.update_all(batch.as_slice());
                    }
                    Mutation::Delete(ids) => {
                        self.shapes.delete(&ids);
                    }
                    Mutation::Clear => {
                        self.shapes.clear();
                    }
                }
                Applied::Shapes
            }
            Event::Undo | Event::Redo => Applied::Rerender,
            Event::Cursor(cursor) => {
                let Some(session_id) = cursor.session_id else {
                    debug!("mirror: cursor without session id ignored");
                    return Applied::Ignored;
                };
                let peer = self.peers.entry(session_id).or_default();
                peer.cursor = Some(Point { x: cursor.x, y: cursor.y });
                if cursor.color.is_some() {
                    peer.color = cursor.color;
                }
                Applied::Presence
            }
            Event::Viewport(viewport) => {
                let Some(session_id) = viewport.session_id.clone() else {
                    debug!("mirror: viewport without session id ignored");
                    return Applied::Ignored;
                };
                self.peers.entry(session_id).or_default().viewport = Some(viewport);
                Applied::Presence
            }
            Event::PresenceJoin { session_id, identity } => {
                let peer = self.peers.entry(session_id).or_default();
                peer.color = Some(identity.color.clone());
                peer.identity = Some(identity);
                Applied::Presence
            }
            Event::PresenceLeave { session_id } => {
                self.peers.remove(&session_id);
                Applied::Presence
            }
            Event::Join { .. } => Applied::Ignored,
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
