//! Authoritative shape sequence for one room.
//!
//! DESIGN
//! ======
//! `RoomState` is the server's copy of a board: an ordered sequence with
//! unique ids. It has no notion of who sent a change or in what order clients
//! saw it; the relay applies mutations in arrival order and the last one
//! applied wins. Adds never replace, updates never create, deletes of unknown
//! ids do nothing. A clear empties the sequence.

use frames::{Batch, Mutation, Shape, ShapeId, ShapeList, ShapePatch};
use tracing::debug;

pub struct RoomState {
    board_id: String,
    shapes: ShapeList,
}

impl RoomState {
    #[must_use]
    pub fn new(board_id: impl Into<String>) -> Self {
        Self { board_id: board_id.into(), shapes: ShapeList::new() }
    }

    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Append shapes whose ids are new to the room. Returns how many landed.
    pub fn apply_add(&mut self, batch: &Batch<Shape>) -> usize {
        let added = self.shapes.add_all(batch.as_slice().iter().cloned());
        let skipped = batch.as_slice().len() - added;
        if skipped > 0 {
            debug!(board_id = %self.board_id, skipped, "room: add skipped existing ids");
        }
        added
    }

    /// Remove every listed id that exists. Returns how many were removed.
    pub fn apply_delete(&mut self, ids: &[ShapeId]) -> usize {
        self.shapes.delete(ids)
    }

    /// Merge each patch into the shape with its id, keeping position.
    pub fn apply_bulk_update(&mut self, patches: &[ShapePatch]) -> usize {
        self.shapes.update_all(patches)
    }

    /// Replace one in-progress shape in place. Never creates.
    pub fn apply_preview(&mut self, patch: &ShapePatch) -> bool {
        self.shapes.update(patch)
    }

    /// Empty the board. Returns how many shapes were removed.
    pub fn apply_clear(&mut self) -> usize {
        let removed = self.shapes.clear();
        if removed > 0 {
            debug!(board_id = %self.board_id, removed, "room: board cleared");
        }
        removed
    }

    /// Apply one mutation; returns the number of shapes it touched.
    pub fn apply(&mut self, mutation: &Mutation) -> usize {
        match mutation {
            Mutation::Add(batch) => self.apply_add(batch),
            Mutation::Update(Batch::Single(patch)) => usize::from(self.apply_preview(patch)),
            Mutation::Update(Batch::Bulk(patches)) => self.apply_bulk_update(patches),
            Mutation::Delete(ids) => self.apply_delete(ids),
            Mutation::Clear => self.apply_clear(),
        }
    }

    /// Full ordered sequence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Shape> {
        self.shapes.to_vec()
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
