//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state, presence, and relay rules so route
//! handlers can stay focused on protocol translation.

pub mod presence;
pub mod relay;
pub mod room;
pub mod session;
pub mod sweeper;
