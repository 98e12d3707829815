//! Partial element updates.
//!
//! A patch names only the fields it changes. Identity fields (`id`,
//! `timestamp`) are not patchable, so host payloads that echo them back are
//! accepted and those keys ignored.

use serde::Deserialize;

use crate::element::{Element, ElementKind, PathPoint};
use crate::{CanvasError, CanvasResult};

/// Changes to a freehand stroke.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrokePatch {
    /// Replacement path.
    pub path: Option<Vec<PathPoint>>,
    /// Replacement color.
    pub color: Option<String>,
    /// Replacement width.
    pub line_width: Option<f32>,
}

/// Changes to a stamp.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StampPatch {
    /// Replacement image reference.
    pub src: Option<String>,
    /// New center X.
    pub x: Option<f32>,
    /// New center Y.
    pub y: Option<f32>,
    /// New display width.
    pub width: Option<f32>,
    /// New display height.
    pub height: Option<f32>,
    /// New stamp category.
    pub stamp_type: Option<String>,
}

/// Changes to a text label.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelPatch {
    /// Replacement content.
    pub text: Option<String>,
    /// New baseline X.
    pub x: Option<f32>,
    /// New baseline Y.
    pub y: Option<f32>,
    /// New color.
    pub color: Option<String>,
    /// New font size.
    pub size: Option<f32>,
}

/// A shallow, per-kind partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementPatch {
    /// Stroke fields.
    Freehand(StrokePatch),
    /// Stamp fields.
    Stamp(StampPatch),
    /// Label fields.
    Text(LabelPatch),
}

impl ElementPatch {
    /// Parse a host JSON object into a patch for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Serialization`] if a present field has the wrong type.
    pub fn from_json(kind: ElementKind, value: serde_json::Value) -> CanvasResult<Self> {
        Ok(match kind {
            ElementKind::Freehand => Self::Freehand(serde_json::from_value(value)?),
            ElementKind::Stamp => Self::Stamp(serde_json::from_value(value)?),
            ElementKind::Text => Self::Text(serde_json::from_value(value)?),
        })
    }

    /// The element kind this patch targets.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Freehand(_) => ElementKind::Freehand,
            Self::Stamp(_) => ElementKind::Stamp,
            Self::Text(_) => ElementKind::Text,
        }
    }
}

impl Element {
    /// Produce a copy of this element with the patch merged in.
    ///
    /// The receiver is untouched, so a rejected patch leaves no trace.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] if the patch targets another kind
    /// or would leave the element without content.
    pub fn patched(&self, patch: ElementPatch, updated: u64) -> CanvasResult<Self> {
        let mut next = self.clone();
        match (&mut next, patch) {
            (Self::Freehand(stroke), ElementPatch::Freehand(p)) => {
                if let Some(path) = p.path {
                    stroke.path = path;
                }
                if let Some(color) = p.color {
                    stroke.color = color;
                }
                if let Some(width) = p.line_width {
                    stroke.line_width = width;
                }
                stroke.updated = Some(updated);
            }
            (Self::Stamp(stamp), ElementPatch::Stamp(p)) => {
                if let Some(src) = p.src {
                    stamp.src = src;
                }
                if let Some(x) = p.x {
                    stamp.x = x;
                }
                if let Some(y) = p.y {
                    stamp.y = y;
                }
                if let Some(width) = p.width {
                    stamp.width = width;
                }
                if let Some(height) = p.height {
                    stamp.height = height;
                }
                if let Some(stamp_type) = p.stamp_type {
                    stamp.stamp_type = stamp_type;
                }
                stamp.updated = Some(updated);
            }
            (Self::Text(label), ElementPatch::Text(p)) => {
                if let Some(text) = p.text {
                    label.text = text;
                }
                if let Some(x) = p.x {
                    label.x = x;
                }
                if let Some(y) = p.y {
                    label.y = y;
                }
                if let Some(color) = p.color {
                    label.color = color;
                }
                if let Some(size) = p.size {
                    label.size = size;
                }
                label.updated = Some(updated);
            }
            (element, patch) => {
                return Err(CanvasError::InvalidOperation(format!(
                    "{} patch applied to {} element",
                    patch.kind(),
                    element.kind()
                )));
            }
        }

        if next.is_persistable() {
            Ok(next)
        } else {
            Err(CanvasError::InvalidOperation(format!(
                "patch would leave {} element {} empty",
                next.kind(),
                next.id()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Stamp, TextLabel};

    #[test]
    fn test_patch_ignores_identity_fields() {
        let patch = ElementPatch::from_json(
            ElementKind::Text,
            serde_json::json!({ "id": "other", "timestamp": 5, "text": "M" }),
        )
        .unwrap();
        let label = Element::Text(TextLabel::new("N", 1.0, 2.0, "#000", 12.0));
        let Element::Text(next) = label.patched(patch, 99).unwrap() else {
            panic!("expected label");
        };
        assert_eq!(next.text, "M");
        assert!(next.id.is_empty());
        assert_eq!(next.updated, Some(99));
    }

    #[test]
    fn test_patch_is_shallow() {
        let stamp = Element::Stamp(Stamp::new("a.png", 10.0, 10.0, 30.0, 30.0));
        let patch = ElementPatch::Stamp(StampPatch {
            x: Some(50.0),
            ..StampPatch::default()
        });
        let Element::Stamp(next) = stamp.patched(patch, 1).unwrap() else {
            panic!("expected stamp");
        };
        assert!((next.x - 50.0).abs() < f32::EPSILON);
        assert!((next.y - 10.0).abs() < f32::EPSILON);
        assert_eq!(next.src, "a.png");
    }

    #[test]
    fn test_mismatched_patch_rejected() {
        let stamp = Element::Stamp(Stamp::new("a.png", 0.0, 0.0, 10.0, 10.0));
        let result = stamp.patched(ElementPatch::Text(LabelPatch::default()), 1);
        assert!(matches!(result, Err(CanvasError::InvalidOperation(_))));
    }

    #[test]
    fn test_emptying_label_rejected() {
        let label = Element::Text(TextLabel::new("N", 0.0, 0.0, "#000", 12.0));
        let patch = ElementPatch::Text(LabelPatch {
            text: Some(String::new()),
            ..LabelPatch::default()
        });
        assert!(label.patched(patch, 1).is_err());
    }
}
