//! Client-side mirror of a board for the realtime whiteboard.
//!
//! The host (browser glue, native UI, a bot) owns the socket. This crate owns
//! the participant's local copy of the shape sequence: local actions apply
//! immediately and hand back the frame to send, remote frames apply on
//! receipt, and undo/redo roll back the local view only.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::SyncEngine`]: snapshot seeding, optimistic apply, remote apply, peers |
//! | [`history`] | Bounded undo/redo stacks of full-sequence snapshots |

pub mod engine;
pub mod history;

pub use engine::{Applied, Peer, SyncEngine};
pub use history::{DEFAULT_HISTORY_DEPTH, History};
