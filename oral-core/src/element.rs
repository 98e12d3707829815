//! Annotation elements - the persisted units owned by the element store.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CanvasError, CanvasResult};

/// Default stroke and text color.
const DEFAULT_COLOR: &str = "#000000";

/// Default stroke width in pixels.
const DEFAULT_LINE_WIDTH: f32 = 2.0;

/// Default label font size in pixels.
const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Unique identifier for an element.
///
/// Freshly generated ids are UUIDv7 strings, so lexical order follows
/// creation order. Ids coming from the host are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Create a new unique, time-ordered element ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no identifier has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The three element buckets of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    /// Freehand pen strokes.
    #[serde(rename = "freedraw")]
    Freehand,
    /// Icon stamps.
    #[serde(rename = "stamp")]
    Stamp,
    /// Text labels.
    #[serde(rename = "text")]
    Text,
}

impl ElementKind {
    /// All kinds in paint order.
    pub const ALL: [Self; 3] = [Self::Freehand, Self::Stamp, Self::Text];

    /// Wire name used by the host.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Freehand => "freedraw",
            Self::Stamp => "stamp",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freedraw" | "freehand" => Ok(Self::Freehand),
            "stamp" => Ok(Self::Stamp),
            "text" => Ok(Self::Text),
            other => Err(CanvasError::UnknownElementType(other.to_string())),
        }
    }
}

/// How a path point joins the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointKind {
    /// Start a new sub-path at this point.
    MoveTo,
    /// Draw a segment from the previous point.
    #[default]
    LineTo,
}

/// A single point of a freehand path, in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Segment type.
    #[serde(rename = "type", default)]
    pub kind: PointKind,
}

impl PathPoint {
    /// A point that starts a sub-path.
    #[must_use]
    pub const fn move_to(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            kind: PointKind::MoveTo,
        }
    }

    /// A point that continues the current sub-path.
    #[must_use]
    pub const fn line_to(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            kind: PointKind::LineTo,
        }
    }
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

const fn default_line_width() -> f32 {
    DEFAULT_LINE_WIDTH
}

const fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

/// A finished freehand pen stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreehandStroke {
    /// Identifier, assigned by the store.
    #[serde(default)]
    pub id: ElementId,
    /// Ordered path points.
    #[serde(default)]
    pub path: Vec<PathPoint>,
    /// CSS color string.
    #[serde(default = "default_color")]
    pub color: String,
    /// Stroke width in pixels.
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    /// Creation time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Last update time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
}

impl FreehandStroke {
    /// Create an unsaved stroke.
    #[must_use]
    pub fn new(path: Vec<PathPoint>, color: impl Into<String>, line_width: f32) -> Self {
        Self {
            id: ElementId::default(),
            path,
            color: color.into(),
            line_width,
            timestamp: 0,
            updated: None,
        }
    }
}

/// A placed icon stamp, centered on `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    /// Identifier, assigned by the store.
    #[serde(default)]
    pub id: ElementId,
    /// Image path or inline `data:` URI.
    #[serde(default)]
    pub src: String,
    /// Center X.
    #[serde(default)]
    pub x: f32,
    /// Center Y.
    #[serde(default)]
    pub y: f32,
    /// Display width in pixels.
    #[serde(default)]
    pub width: f32,
    /// Display height in pixels. Zero means "same as width".
    #[serde(default)]
    pub height: f32,
    /// Free-form stamp category, e.g. `TADS` or `Hook`.
    #[serde(default)]
    pub stamp_type: String,
    /// Creation time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Last update time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
}

impl Stamp {
    /// Create an unsaved stamp.
    #[must_use]
    pub fn new(src: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: ElementId::default(),
            src: src.into(),
            x,
            y,
            width,
            height,
            stamp_type: String::new(),
            timestamp: 0,
            updated: None,
        }
    }

    /// Set the stamp category.
    #[must_use]
    pub fn with_type(mut self, stamp_type: impl Into<String>) -> Self {
        self.stamp_type = stamp_type.into();
        self
    }

    /// Effective display height.
    #[must_use]
    pub fn effective_height(&self) -> f32 {
        if self.height > 0.0 {
            self.height
        } else {
            self.width
        }
    }
}

/// A text label anchored at its baseline start `(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLabel {
    /// Identifier, assigned by the store.
    #[serde(default)]
    pub id: ElementId,
    /// Label content.
    #[serde(default)]
    pub text: String,
    /// Baseline start X.
    #[serde(default)]
    pub x: f32,
    /// Baseline Y.
    #[serde(default)]
    pub y: f32,
    /// CSS color string.
    #[serde(default = "default_color")]
    pub color: String,
    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub size: f32,
    /// Creation time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Last update time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
}

impl TextLabel {
    /// Create an unsaved label.
    #[must_use]
    pub fn new(text: impl Into<String>, x: f32, y: f32, color: impl Into<String>, size: f32) -> Self {
        Self {
            id: ElementId::default(),
            text: text.into(),
            x,
            y,
            color: color.into(),
            size,
            timestamp: 0,
            updated: None,
        }
    }
}

/// A persisted annotation unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Element {
    /// A freehand stroke.
    Freehand(FreehandStroke),
    /// An icon stamp.
    Stamp(Stamp),
    /// A text label.
    Text(TextLabel),
}

impl Element {
    /// Parse host JSON into an element of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Serialization`] if the payload does not match the kind.
    pub fn from_json(kind: ElementKind, value: serde_json::Value) -> CanvasResult<Self> {
        Ok(match kind {
            ElementKind::Freehand => Self::Freehand(serde_json::from_value(value)?),
            ElementKind::Stamp => Self::Stamp(serde_json::from_value(value)?),
            ElementKind::Text => Self::Text(serde_json::from_value(value)?),
        })
    }

    /// The bucket this element belongs to.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Freehand(_) => ElementKind::Freehand,
            Self::Stamp(_) => ElementKind::Stamp,
            Self::Text(_) => ElementKind::Text,
        }
    }

    /// The element identifier.
    #[must_use]
    pub fn id(&self) -> &ElementId {
        match self {
            Self::Freehand(s) => &s.id,
            Self::Stamp(s) => &s.id,
            Self::Text(t) => &t.id,
        }
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        match self {
            Self::Freehand(s) => s.timestamp,
            Self::Stamp(s) => s.timestamp,
            Self::Text(t) => t.timestamp,
        }
    }

    /// Whether the element carries enough content to be stored.
    ///
    /// Strokes need at least one point and labels need non-empty text.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        match self {
            Self::Freehand(s) => !s.path.is_empty(),
            Self::Stamp(_) => true,
            Self::Text(t) => !t.text.trim().is_empty(),
        }
    }

    pub(crate) fn assign_identity(&mut self, id: ElementId, timestamp: u64) {
        match self {
            Self::Freehand(s) => {
                s.id = id;
                s.timestamp = timestamp;
                s.updated = None;
            }
            Self::Stamp(s) => {
                s.id = id;
                s.timestamp = timestamp;
                s.updated = None;
            }
            Self::Text(t) => {
                t.id = id;
                t.timestamp = timestamp;
                t.updated = None;
            }
        }
    }
}
