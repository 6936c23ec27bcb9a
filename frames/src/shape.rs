//! Shape model: drawable entities, partial patches, and the ordered sequence.
//!
//! A board's content is an ordered list of shapes. Insertion order is z-order:
//! later shapes draw on top and win hit-test ties. The same [`ShapeList`]
//! semantics back both the server's authoritative room state and the client
//! mirror, so an event applied on either side lands identically.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::Data;

/// Opaque shape identifier, unique within one board.
pub type ShapeId = String;

/// A point in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Style fields shared by every shape variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Stroke color as a CSS color string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Stroke thickness in board units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    /// Fill color as a CSS color string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// Type-specific geometry, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    /// Freehand stroke; points are appended while it is being drawn.
    Stroke { points: Vec<Point> },
    /// Axis-aligned rectangle with an optional centered label.
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Ellipse inscribed in its bounding box, with an optional centered label.
    Ellipse {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Directed arrow between two points.
    Arrow { from: Point, to: Point },
    /// Free text anchored at a point.
    Text { x: f64, y: f64, text: String },
}

/// A drawable entity as stored in room state and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(flatten)]
    pub style: Style,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    #[must_use]
    pub fn new(id: impl Into<ShapeId>, kind: ShapeKind) -> Self {
        Self { id: id.into(), style: Style::default(), kind }
    }

    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Wire name of this shape's variant.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ShapeKind::Stroke { .. } => "stroke",
            ShapeKind::Rect { .. } => "rect",
            ShapeKind::Ellipse { .. } => "ellipse",
            ShapeKind::Arrow { .. } => "arrow",
            ShapeKind::Text { .. } => "text",
        }
    }

    /// Merge `fields` over this shape's fields and re-validate the result.
    ///
    /// `id` is never overwritten. A `null` clears an optional field.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the merged fields no longer describe a
    /// valid shape (wrong types, missing geometry after a `type` change).
    pub fn patched(&self, fields: &Data) -> Result<Shape, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            for (key, v) in fields {
                if key == "id" {
                    continue;
                }
                obj.insert(key.clone(), v.clone());
            }
        }
        serde_json::from_value(value)
    }
}

/// Partial shape used by updates: an id plus whichever fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePatch {
    pub id: ShapeId,
    #[serde(flatten)]
    pub fields: Data,
}

impl ShapePatch {
    #[must_use]
    pub fn new(id: impl Into<ShapeId>) -> Self {
        Self { id: id.into(), fields: Data::new() }
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl From<&Shape> for ShapePatch {
    /// A patch that rewrites every field of `shape`.
    fn from(shape: &Shape) -> Self {
        let fields = match serde_json::to_value(shape) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("id");
                map
            }
            _ => Data::new(),
        };
        Self { id: shape.id.clone(), fields }
    }
}

// =============================================================================
// ORDERED SEQUENCE
// =============================================================================

/// Ordered shape sequence with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeList {
    shapes: Vec<Shape>,
}

impl ShapeList {
    #[must_use]
    pub fn new() -> Self {
        Self { shapes: Vec::new() }
    }

    /// Build a list from a snapshot. Later duplicates of an id are dropped.
    #[must_use]
    pub fn from_shapes(shapes: Vec<Shape>) -> Self {
        let mut list = Self::new();
        for shape in shapes {
            list.add(shape);
        }
        list
    }

    /// Append `shape`. Returns `false` (and changes nothing) if its id is
    /// already present: the first writer of an id wins.
    pub fn add(&mut self, shape: Shape) -> bool {
        if self.contains(&shape.id) {
            return false;
        }
        self.shapes.push(shape);
        true
    }

    /// Append every shape in order. Returns how many were inserted.
    pub fn add_all(&mut self, shapes: impl IntoIterator<Item = Shape>) -> usize {
        let mut inserted = 0;
        for shape in shapes {
            if self.add(shape) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Remove every shape whose id is in `ids`. Unknown ids are ignored.
    /// Returns how many shapes were removed.
    pub fn delete(&mut self, ids: &[ShapeId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.shapes.len();
        self.shapes.retain(|s| !doomed.contains(s.id.as_str()));
        before - self.shapes.len()
    }

    /// Merge `patch` into the shape with the same id, keeping its position.
    /// Returns `false` if the id is unknown or the merge is invalid.
    pub fn update(&mut self, patch: &ShapePatch) -> bool {
        let Some(slot) = self.shapes.iter_mut().find(|s| s.id == patch.id) else {
            return false;
        };
        match slot.patched(&patch.fields) {
            Ok(next) => {
                *slot = next;
                true
            }
            Err(_) => false,
        }
    }

    /// Apply every patch in order. Returns how many shapes changed.
    pub fn update_all(&mut self, patches: &[ShapePatch]) -> usize {
        let mut changed = 0;
        for patch in patches {
            if self.update(patch) {
                changed += 1;
            }
        }
        changed
    }

    /// Remove every shape. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.shapes.len();
        self.shapes.clear();
        removed
    }

    /// Replace the whole sequence (snapshot load, undo, redo).
    pub fn replace(&mut self, shapes: Vec<Shape>) {
        *self = Self::from_shapes(shapes);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.shapes.iter().any(|s| s.id == id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Shape] {
        &self.shapes
    }

    /// Owned copy of the current sequence.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Shape> {
        self.shapes.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;
