//! Versioned snapshot of the element store, the wire format shared with the host.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::background::BackgroundConfig;
use crate::element::{Element, ElementId, FreehandStroke, Stamp, TextLabel};
use crate::{CanvasError, CanvasResult};

/// Current snapshot format version.
pub const FORMAT_VERSION: &str = "4.0";

/// Serializable record of the entire store plus background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Freehand strokes in insertion order.
    #[serde(default)]
    pub strokes: Vec<FreehandStroke>,
    /// Stamps in insertion order.
    #[serde(default)]
    pub stamps: Vec<Stamp>,
    /// Labels in insertion order.
    #[serde(default)]
    pub labels: Vec<TextLabel>,
    /// Active background.
    #[serde(default)]
    pub background: BackgroundConfig,
    /// Format version of the producer.
    #[serde(default)]
    pub version: String,
    /// Session that produced the snapshot.
    #[serde(default)]
    pub session_id: String,
    /// Export time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
}

/// The older `elements: { freedraw, stamp, text }` layout.
#[derive(Debug, Default, Deserialize)]
struct LegacyElements {
    #[serde(default)]
    freedraw: Vec<FreehandStroke>,
    #[serde(default)]
    stamp: Vec<Stamp>,
    #[serde(default)]
    text: Vec<TextLabel>,
}

#[derive(Deserialize)]
struct SnapshotWire {
    #[serde(flatten)]
    snapshot: Snapshot,
    #[serde(default)]
    elements: Option<LegacyElements>,
}

impl Snapshot {
    /// Parse a snapshot from host JSON.
    ///
    /// Both the current layout and the legacy `elements` layout are accepted.
    /// Missing fields default; the result is normalized (see [`Snapshot::normalize`]).
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::MalformedSnapshot`] if the input is not a JSON object
    /// of the expected shape.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let wire: SnapshotWire =
            serde_json::from_str(json).map_err(|e| CanvasError::MalformedSnapshot(e.to_string()))?;
        let mut snapshot = wire.snapshot;
        if let Some(legacy) = wire.elements {
            if snapshot.strokes.is_empty() {
                snapshot.strokes = legacy.freedraw;
            }
            if snapshot.stamps.is_empty() {
                snapshot.stamps = legacy.stamp;
            }
            if snapshot.labels.is_empty() {
                snapshot.labels = legacy.text;
            }
        }
        snapshot.normalize();
        Ok(snapshot)
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string(self).map_err(CanvasError::Serialization)
    }

    /// Total number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.strokes.len() + self.stamps.len() + self.labels.len()
    }

    /// Enforce store invariants on externally produced data.
    ///
    /// Elements without content are dropped; missing or duplicate ids within a
    /// bucket are replaced with fresh ones. Returns the number of dropped elements.
    pub fn normalize(&mut self) -> usize {
        let before = self.element_count();

        self.strokes = normalize_bucket(std::mem::take(&mut self.strokes), Element::Freehand, |e| {
            match e {
                Element::Freehand(s) => Some(s),
                _ => None,
            }
        });
        self.stamps = normalize_bucket(std::mem::take(&mut self.stamps), Element::Stamp, |e| {
            match e {
                Element::Stamp(s) => Some(s),
                _ => None,
            }
        });
        self.labels = normalize_bucket(std::mem::take(&mut self.labels), Element::Text, |e| match e {
            Element::Text(t) => Some(t),
            _ => None,
        });

        let dropped = before - self.element_count();
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} empty elements from snapshot");
        }
        dropped
    }
}

fn normalize_bucket<T, W, U>(items: Vec<T>, wrap: W, unwrap: U) -> Vec<T>
where
    W: Fn(T) -> Element,
    U: Fn(Element) -> Option<T>,
{
    let mut seen: HashSet<ElementId> = HashSet::new();
    items
        .into_iter()
        .map(&wrap)
        .filter(Element::is_persistable)
        .map(|mut element| {
            if element.id().is_empty() || seen.contains(element.id()) {
                let timestamp = element.timestamp();
                element.assign_identity(ElementId::generate(), timestamp);
            }
            seen.insert(element.id().clone());
            element
        })
        .filter_map(&unwrap)
        .collect()
}
