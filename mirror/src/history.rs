//! Local undo/redo history.
//!
//! Each entry is a full copy of the shape sequence. Both stacks are bounded;
//! when full, the oldest entry falls off.

use std::collections::VecDeque;

use frames::Shape;

/// Default number of snapshots kept on each stack.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Vec<Shape>>,
    redo: VecDeque<Vec<Shape>>,
    depth: usize,
}

impl History {
    /// Create empty stacks holding at most `depth` snapshots each.
    /// A depth of zero disables history.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: VecDeque::new(), depth }
    }

    /// Record the sequence as it was before a committed local mutation.
    /// Clears the redo stack.
    pub fn record(&mut self, before: Vec<Shape>) {
        push_bounded(&mut self.undo, before, self.depth);
        self.redo.clear();
    }

    /// Pop the latest undo snapshot, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Vec<Shape>) -> Option<Vec<Shape>> {
        let previous = self.undo.pop_back()?;
        push_bounded(&mut self.redo, current, self.depth);
        Some(previous)
    }

    /// Pop the latest redo snapshot, parking `current` on the undo stack.
    pub fn redo(&mut self, current: Vec<Shape>) -> Option<Vec<Shape>> {
        let next = self.redo.pop_back()?;
        push_bounded(&mut self.undo, current, self.depth);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

fn push_bounded(stack: &mut VecDeque<Vec<Shape>>, entry: Vec<Shape>, depth: usize) {
    if depth == 0 {
        return;
    }
    while stack.len() >= depth {
        stack.pop_front();
    }
    stack.push_back(entry);
}

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;
