//! Typed events layered over [`Frame`].
//!
//! DESIGN
//! ======
//! Transport code moves frames; everything that interprets a payload goes
//! through [`Event::from_frame`] first, so handlers match on variants instead
//! of poking at `data` keys. Mutations are a tagged [`Mutation`] whose add and
//! update arms carry an explicit [`Batch`], replacing a `bulk` flag riding
//! inside a single-shape payload.
//!
//! | Syscall | Variant | Data |
//! |---------|---------|------|
//! | `session:connected` | `Connected` | `session_id` |
//! | `board:join` (request) | `Join` | `board_id`, `identity` |
//! | `board:join` (done) | `Snapshot` | `board_id`, `shapes` |
//! | `shape:add` | `Mutation(Add)` | `shape` or `shapes` |
//! | `shape:update` | `Mutation(Update)` | `shape` or `shapes` |
//! | `shape:delete` | `Mutation(Delete)` | `ids` |
//! | `shape:clear` | `Mutation(Clear)` | none |
//! | `presence:cursor` | `Cursor` | `session_id`, `color`, `x`, `y` |
//! | `presence:viewport` | `Viewport` | `session_id`, `x`, `y`, `zoom` |
//! | `presence:join` | `PresenceJoin` | `session_id`, `identity` |
//! | `presence:leave` | `PresenceLeave` | `session_id` |
//! | `history:undo` / `history:redo` | `Undo` / `Redo` | none |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shape::{Shape, ShapeId, ShapePatch};
use crate::{Data, Frame, Status};

pub const CONNECTED: &str = "session:connected";
pub const JOIN: &str = "board:join";
pub const SHAPE_ADD: &str = "shape:add";
pub const SHAPE_UPDATE: &str = "shape:update";
pub const SHAPE_DELETE: &str = "shape:delete";
pub const SHAPE_CLEAR: &str = "shape:clear";
pub const CURSOR: &str = "presence:cursor";
pub const VIEWPORT: &str = "presence:viewport";
pub const PRESENCE_JOIN: &str = "presence:join";
pub const PRESENCE_LEAVE: &str = "presence:leave";
pub const UNDO: &str = "history:undo";
pub const REDO: &str = "history:redo";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid payload for {syscall}: {source}")]
    Invalid {
        syscall: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Who a participant says they are. Supplied on join, echoed in presence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Identity {
    /// Stand-in identity for a join that did not carry one.
    #[must_use]
    pub fn guest(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: "Guest".into(), color: "#888888".into() }
    }
}

/// Pointer position broadcast by a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Set by the relay; whatever a client puts here is overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// Camera pan/zoom broadcast by a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Set by the relay; whatever a client puts here is overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(alias = "z")]
    pub zoom: f64,
}

/// One item or many. Encoded as `shape` or `shapes` in frame data.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch<T> {
    Single(T),
    Bulk(Vec<T>),
}

impl<T> Batch<T> {
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Bulk(items) => items,
        }
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(item) => vec![item],
            Self::Bulk(items) => items,
        }
    }

    #[must_use]
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::Bulk(_))
    }
}

/// A change to a board's shape sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Add(Batch<Shape>),
    /// `Single` is the in-progress draw preview; `Bulk` is a committed merge.
    Update(Batch<ShapePatch>),
    Delete(Vec<ShapeId>),
    /// Remove every shape on the board.
    Clear,
}

/// Every message that crosses the live connection, in typed form.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected { session_id: String },
    Join { board_id: Option<String>, identity: Option<Identity> },
    Snapshot { board_id: String, shapes: Vec<Shape> },
    Mutation(Mutation),
    Cursor(Cursor),
    Viewport(Viewport),
    Undo,
    Redo,
    PresenceJoin { session_id: String, identity: Identity },
    PresenceLeave { session_id: String },
}

// =============================================================================
// FRAME -> EVENT
// =============================================================================

impl Event {
    /// Interpret a frame.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] for unknown syscalls and for payloads that are
    /// missing required fields or carry the wrong types.
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        match frame.syscall.as_str() {
            CONNECTED => Ok(Self::Connected { session_id: field(frame, "session_id")? }),
            JOIN if frame.status == Status::Done => Ok(Self::Snapshot {
                board_id: optional_field::<String>(frame, "board_id")?
                    .or_else(|| frame.board_id.clone())
                    .unwrap_or_default(),
                shapes: field(frame, "shapes")?,
            }),
            JOIN => Ok(Self::Join {
                board_id: frame
                    .board_id
                    .clone()
                    .or(optional_field(frame, "board_id")?),
                identity: optional_field(frame, "identity")?,
            }),
            SHAPE_ADD => Ok(Self::Mutation(Mutation::Add(batch(frame)?))),
            SHAPE_UPDATE => Ok(Self::Mutation(Mutation::Update(batch(frame)?))),
            SHAPE_DELETE => Ok(Self::Mutation(Mutation::Delete(field(frame, "ids")?))),
            SHAPE_CLEAR => Ok(Self::Mutation(Mutation::Clear)),
            CURSOR => Ok(Self::Cursor(payload(frame)?)),
            VIEWPORT => Ok(Self::Viewport(payload(frame)?)),
            PRESENCE_JOIN => Ok(Self::PresenceJoin {
                session_id: field(frame, "session_id")?,
                identity: field(frame, "identity")?,
            }),
            PRESENCE_LEAVE => Ok(Self::PresenceLeave { session_id: field(frame, "session_id")? }),
            UNDO => Ok(Self::Undo),
            REDO => Ok(Self::Redo),
            other => Err(EventError::UnknownSyscall(other.to_owned())),
        }
    }

    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Connected { .. } => CONNECTED,
            Self::Join { .. } | Self::Snapshot { .. } => JOIN,
            Self::Mutation(Mutation::Add(_)) => SHAPE_ADD,
            Self::Mutation(Mutation::Update(_)) => SHAPE_UPDATE,
            Self::Mutation(Mutation::Delete(_)) => SHAPE_DELETE,
            Self::Mutation(Mutation::Clear) => SHAPE_CLEAR,
            Self::Cursor(_) => CURSOR,
            Self::Viewport(_) => VIEWPORT,
            Self::Undo => UNDO,
            Self::Redo => REDO,
            Self::PresenceJoin { .. } => PRESENCE_JOIN,
            Self::PresenceLeave { .. } => PRESENCE_LEAVE,
        }
    }

    /// Frame payload for this event.
    #[must_use]
    pub fn to_data(&self) -> Data {
        let mut data = Data::new();
        match self {
            Self::Connected { session_id } | Self::PresenceLeave { session_id } => {
                data.insert("session_id".into(), Value::String(session_id.clone()));
            }
            Self::Join { board_id, identity } => {
                if let Some(board_id) = board_id {
                    data.insert("board_id".into(), Value::String(board_id.clone()));
                }
                if let Some(identity) = identity {
                    data.insert("identity".into(), to_json(identity));
                }
            }
            Self::Snapshot { board_id, shapes } => {
                data.insert("board_id".into(), Value::String(board_id.clone()));
                data.insert("shapes".into(), to_json(shapes));
            }
            Self::Mutation(Mutation::Add(shapes)) => insert_batch(&mut data, shapes),
            Self::Mutation(Mutation::Update(patches)) => insert_batch(&mut data, patches),
            Self::Mutation(Mutation::Delete(ids)) => {
                data.insert("ids".into(), to_json(ids));
            }
            Self::Cursor(cursor) => data = to_object(cursor),
            Self::Viewport(viewport) => data = to_object(viewport),
            Self::Mutation(Mutation::Clear) | Self::Undo | Self::Redo => {}
            Self::PresenceJoin { session_id, identity } => {
                data.insert("session_id".into(), Value::String(session_id.clone()));
                data.insert("identity".into(), to_json(identity));
            }
        }
        data
    }

    /// Build the frame for this event. `Snapshot` becomes a `done` frame;
    /// everything else is a request.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::request(self.syscall(), self.to_data());
        match self {
            Self::Join { board_id: Some(board_id), .. } => frame.board_id = Some(board_id.clone()),
            Self::Snapshot { board_id, .. } => {
                frame.board_id = Some(board_id.clone());
                frame.status = Status::Done;
            }
            _ => {}
        }
        frame
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn invalid(frame: &Frame, source: serde_json::Error) -> EventError {
    EventError::Invalid { syscall: frame.syscall.clone(), source }
}

fn field<T: DeserializeOwned>(frame: &Frame, key: &'static str) -> Result<T, EventError> {
    let value = frame.data.get(key).ok_or(EventError::MissingField(key))?;
    serde_json::from_value(value.clone()).map_err(|e| invalid(frame, e))
}

fn optional_field<T: DeserializeOwned>(frame: &Frame, key: &'static str) -> Result<Option<T>, EventError> {
    match frame.data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| invalid(frame, e)),
    }
}

fn payload<T: DeserializeOwned>(frame: &Frame) -> Result<T, EventError> {
    serde_json::from_value(Value::Object(frame.data.clone())).map_err(|e| invalid(frame, e))
}

fn batch<T: DeserializeOwned>(frame: &Frame) -> Result<Batch<T>, EventError> {
    if frame.data.contains_key("shapes") {
        return Ok(Batch::Bulk(field(frame, "shapes")?));
    }
    Ok(Batch::Single(field(frame, "shape")?))
}

fn insert_batch<T: Serialize>(data: &mut Data, batch: &Batch<T>) {
    match batch {
        Batch::Single(item) => data.insert("shape".into(), to_json(item)),
        Batch::Bulk(items) => data.insert("shapes".into(), to_json(items)),
    };
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn to_object<T: Serialize>(value: &T) -> Data {
    match to_json(value) {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
