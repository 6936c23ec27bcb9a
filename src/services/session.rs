//! Per-connection session state and board id generation.
//!
//! A session starts `Unbound`. Only a join binds it; a second join rebinds it
//! to the new board. The session ends when its connection closes.

use frames::Identity;
use rand::Rng;
use uuid::Uuid;

const BOARD_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BOARD_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound { board_id: String },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub binding: Binding,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        Self { id, identity: Identity::guest(id.to_string()), binding: Binding::Unbound }
    }

    #[must_use]
    pub fn board_id(&self) -> Option<&str> {
        match &self.binding {
            Binding::Unbound => None,
            Binding::Bound { board_id } => Some(board_id),
        }
    }

    pub fn bind(&mut self, board_id: impl Into<String>, identity: Identity) {
        self.identity = identity;
        self.binding = Binding::Bound { board_id: board_id.into() };
    }

    pub fn unbind(&mut self) {
        self.binding = Binding::Unbound;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Random 8-character board id from `[0-9a-z]`.
#[must_use]
pub fn generate_board_id() -> String {
    let mut rng = rand::rng();
    (0..BOARD_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..BOARD_ID_ALPHABET.len());
            BOARD_ID_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
