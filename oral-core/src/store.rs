//! The element store: authoritative record of every placed element.
//!
//! Mutation happens only through the CRUD operations below. Each successful
//! mutation is announced to subscribed [`StoreObserver`]s, which is where
//! advisory persistence lives; the store itself performs no I/O.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::background::{BackgroundConfig, BackgroundOptions};
use crate::element::{Element, ElementId, ElementKind};
use crate::geometry::{any_point_within, circle_intersects_rect, label_extent, DrawRect};
use crate::patch::ElementPatch;
use crate::snapshot::{Snapshot, FORMAT_VERSION};
use crate::{CanvasError, CanvasResult};

/// A mutation the store has just applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// An element was appended.
    Added(ElementKind, ElementId),
    /// An element was patched.
    Updated(ElementKind, ElementId),
    /// An element was removed.
    Removed(ElementKind, ElementId),
    /// One bucket was emptied.
    Cleared(ElementKind),
    /// Everything was emptied and the background reset.
    ClearedAll,
    /// The background configuration was replaced.
    BackgroundChanged,
    /// The whole store was replaced from a snapshot.
    Imported,
}

/// Receives change notifications from an [`ElementStore`].
///
/// Observers run synchronously after the mutation is complete and must not
/// fail the mutation; errors are theirs to log.
pub trait StoreObserver: Send {
    /// Called after every successful mutation.
    fn store_changed(&mut self, store: &ElementStore, change: &StoreChange);
}

/// Three ordered element buckets plus the active background.
///
/// Insertion order is paint order and decides "last wins" hit queries.
pub struct ElementStore {
    strokes: Vec<Element>,
    stamps: Vec<Element>,
    labels: Vec<Element>,
    background: BackgroundConfig,
    version: String,
    session_id: String,
    observers: Vec<Box<dyn StoreObserver>>,
}

impl std::fmt::Debug for ElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementStore")
            .field("strokes", &self.strokes.len())
            .field("stamps", &self.stamps.len())
            .field("labels", &self.labels.len())
            .field("background", &self.background)
            .field("version", &self.version)
            .field("session_id", &self.session_id)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for ElementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementStore {
    /// Create an empty store with a fresh session id and the default background.
    #[must_use]
    pub fn new() -> Self {
        Self::with_session_id(Uuid::new_v4().to_string())
    }

    /// Create an empty store for an existing session.
    #[must_use]
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        tracing::info!("Element store created for session {session_id}");
        Self {
            strokes: Vec::new(),
            stamps: Vec::new(),
            labels: Vec::new(),
            background: BackgroundConfig::default(),
            version: FORMAT_VERSION.to_string(),
            session_id,
            observers: Vec::new(),
        }
    }

    /// Register an observer for subsequent mutations.
    pub fn subscribe(&mut self, observer: Box<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Format version this store writes.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Elements of one kind in insertion order.
    #[must_use]
    pub fn elements(&self, kind: ElementKind) -> &[Element] {
        self.bucket(kind)
    }

    /// Look up one element.
    #[must_use]
    pub fn get(&self, kind: ElementKind, id: &ElementId) -> Option<&Element> {
        self.bucket(kind).iter().find(|e| e.id() == id)
    }

    /// Total number of elements across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len() + self.stamps.len() + self.labels.len()
    }

    /// Whether all buckets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active background configuration.
    #[must_use]
    pub fn background(&self) -> &BackgroundConfig {
        &self.background
    }

    // -----------------------------------------------------------------------
    // Typed CRUD
    // -----------------------------------------------------------------------

    /// Append an element, assigning it a fresh id and creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] for a stroke without points or
    /// a label without text.
    pub fn insert(&mut self, mut element: Element) -> CanvasResult<ElementId> {
        let kind = element.kind();
        if !element.is_persistable() {
            return Err(CanvasError::InvalidOperation(format!(
                "refusing to store empty {kind} element"
            )));
        }

        let id = ElementId::generate();
        element.assign_identity(id.clone(), current_timestamp_ms());
        self.bucket_mut(kind).push(element);

        tracing::debug!("Added {kind} element {id}");
        self.notify(&StoreChange::Added(kind, id.clone()));
        Ok(id)
    }

    /// Merge `patch` into the element `id` of `kind`.
    ///
    /// Returns `false` if the element does not exist or the patch is rejected.
    pub fn apply_patch(&mut self, kind: ElementKind, id: &ElementId, patch: ElementPatch) -> bool {
        let index = match self.position(kind, id) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Update skipped: {e}");
                return false;
            }
        };

        let bucket = self.bucket_mut(kind);
        match bucket[index].patched(patch, current_timestamp_ms()) {
            Ok(next) => bucket[index] = next,
            Err(e) => {
                tracing::warn!("Update of {kind} element {id} rejected: {e}");
                return false;
            }
        }

        tracing::debug!("Updated {kind} element {id}");
        self.notify(&StoreChange::Updated(kind, id.clone()));
        true
    }

    /// Remove the element `id` of `kind`. Returns `false` if it was not present.
    pub fn remove(&mut self, kind: ElementKind, id: &ElementId) -> bool {
        let index = match self.position(kind, id) {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!("Remove skipped: {e}");
                return false;
            }
        };
        self.bucket_mut(kind).remove(index);

        tracing::debug!("Removed {kind} element {id}");
        self.notify(&StoreChange::Removed(kind, id.clone()));
        true
    }

    /// Empty one bucket.
    pub fn clear_kind(&mut self, kind: ElementKind) {
        let count = self.bucket(kind).len();
        self.bucket_mut(kind).clear();
        tracing::info!("Cleared {count} {kind} elements");
        self.notify(&StoreChange::Cleared(kind));
    }

    /// Empty every bucket and reset the background to the built-in default.
    pub fn clear_all(&mut self) {
        self.strokes.clear();
        self.stamps.clear();
        self.labels.clear();
        self.background = BackgroundConfig::default();
        tracing::info!("Cleared all elements and reset background");
        self.notify(&StoreChange::ClearedAll);
    }

    /// Replace the background source; `options` are merged onto the current policy.
    pub fn set_background(&mut self, src: impl Into<String>, options: BackgroundOptions) {
        self.background = BackgroundConfig {
            src: src.into(),
            options: options.merged_onto(self.background.options),
        };
        tracing::info!(
            "Background set to {} ({:?})",
            abbreviate(&self.background.src),
            self.background.options.fit_method
        );
        self.notify(&StoreChange::BackgroundChanged);
    }

    // -----------------------------------------------------------------------
    // Host-named operations
    // -----------------------------------------------------------------------

    /// Add an element from host JSON under a wire type name.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::UnknownElementType`] for an unknown type name,
    /// [`CanvasError::Serialization`] for a payload of the wrong shape, or
    /// [`CanvasError::InvalidOperation`] for an empty element.
    pub fn add_element(&mut self, type_name: &str, data: serde_json::Value) -> CanvasResult<ElementId> {
        let kind: ElementKind = type_name.parse()?;
        let element = Element::from_json(kind, data)?;
        self.insert(element)
    }

    /// Shallow-merge host JSON into an element. Returns `false` on unknown
    /// type, missing id, or an unusable payload.
    pub fn update_element(&mut self, type_name: &str, id: &str, data: serde_json::Value) -> bool {
        let Ok(kind) = type_name.parse::<ElementKind>() else {
            tracing::warn!("Update skipped: unknown element type {type_name:?}");
            return false;
        };
        match ElementPatch::from_json(kind, data) {
            Ok(patch) => self.apply_patch(kind, &ElementId::from(id), patch),
            Err(e) => {
                tracing::warn!("Update of {kind} element {id} has unusable data: {e}");
                false
            }
        }
    }

    /// Remove by wire type name. Returns `false` on unknown type or missing id.
    pub fn remove_element(&mut self, type_name: &str, id: &str) -> bool {
        match type_name.parse::<ElementKind>() {
            Ok(kind) => self.remove(kind, &ElementId::from(id)),
            Err(_) => {
                tracing::warn!("Remove skipped: unknown element type {type_name:?}");
                false
            }
        }
    }

    /// Empty one bucket by wire type name. Returns `false` on unknown type.
    pub fn clear_elements_by_type(&mut self, type_name: &str) -> bool {
        match type_name.parse::<ElementKind>() {
            Ok(kind) => {
                self.clear_kind(kind);
                true
            }
            Err(_) => {
                tracing::warn!("Clear skipped: unknown element type {type_name:?}");
                false
            }
        }
    }

    /// Id-keyed projection of one bucket. Unknown types yield an empty map.
    #[must_use]
    pub fn get_elements_by_type(&self, type_name: &str) -> HashMap<ElementId, Element> {
        let Ok(kind) = type_name.parse::<ElementKind>() else {
            tracing::warn!("Unknown element type {type_name:?} requested");
            return HashMap::new();
        };
        self.bucket(kind)
            .iter()
            .map(|e| (e.id().clone(), e.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Hit testing
    // -----------------------------------------------------------------------

    /// Topmost (last inserted) element of `kind` under a hit circle.
    #[must_use]
    pub fn element_at(&self, kind: ElementKind, x: f32, y: f32, radius: f32) -> Option<&Element> {
        self.bucket(kind)
            .iter()
            .rev()
            .find(|e| element_hit(e, x, y, radius))
    }

    /// Ids of every element of `kind` under a hit circle, in insertion order.
    #[must_use]
    pub fn elements_near(&self, kind: ElementKind, x: f32, y: f32, radius: f32) -> Vec<ElementId> {
        self.bucket(kind)
            .iter()
            .filter(|e| element_hit(e, x, y, radius))
            .map(|e| e.id().clone())
            .collect()
    }

    /// Remove every element of `kind` under a hit circle, returning the removed ids.
    pub fn remove_elements_at(&mut self, kind: ElementKind, x: f32, y: f32, radius: f32) -> Vec<ElementId> {
        let hits = self.elements_near(kind, x, y, radius);
        hits.into_iter().filter(|id| self.remove(kind, id)).collect()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Serializable record of the whole store.
    #[must_use]
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            strokes: self
                .strokes
                .iter()
                .filter_map(|e| match e {
                    Element::Freehand(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            stamps: self
                .stamps
                .iter()
                .filter_map(|e| match e {
                    Element::Stamp(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            labels: self
                .labels
                .iter()
                .filter_map(|e| match e {
                    Element::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect(),
            background: self.background.clone(),
            version: self.version.clone(),
            session_id: self.session_id.clone(),
            timestamp: current_timestamp_ms(),
        }
    }

    /// Snapshot as JSON for the host.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> CanvasResult<String> {
        let json = self.export_snapshot().to_json()?;
        tracing::info!("Exported snapshot: {} elements, {} bytes", self.len(), json.len());
        Ok(json)
    }

    /// Replace the store contents from host JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::MalformedSnapshot`] on unparsable input; the store
    /// is left untouched in that case.
    pub fn import_snapshot(&mut self, json: &str) -> CanvasResult<()> {
        let snapshot = Snapshot::from_json(json)?;
        self.import(snapshot);
        Ok(())
    }

    /// Replace the store contents with `snapshot`, keeping this session id.
    pub fn import(&mut self, snapshot: Snapshot) {
        self.replace_contents(snapshot);
        self.notify(&StoreChange::Imported);
    }

    /// Replace the store contents with `snapshot` and adopt its session id.
    ///
    /// Used when recovering a previous session from the advisory slot.
    pub fn restore(&mut self, snapshot: Snapshot) {
        if !snapshot.session_id.is_empty() {
            self.session_id.clone_from(&snapshot.session_id);
        }
        self.replace_contents(snapshot);
        self.notify(&StoreChange::Imported);
    }

    fn replace_contents(&mut self, mut snapshot: Snapshot) {
        if !snapshot.version.is_empty() && snapshot.version != self.version {
            tracing::warn!(
                "Snapshot version mismatch (snapshot {}, current {})",
                snapshot.version,
                self.version
            );
        }
        snapshot.normalize();

        self.strokes = snapshot.strokes.into_iter().map(Element::Freehand).collect();
        self.stamps = snapshot.stamps.into_iter().map(Element::Stamp).collect();
        self.labels = snapshot.labels.into_iter().map(Element::Text).collect();
        self.background = snapshot.background;

        tracing::info!(
            "Imported snapshot: {} strokes, {} stamps, {} labels",
            self.strokes.len(),
            self.stamps.len(),
            self.labels.len()
        );
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn bucket(&self, kind: ElementKind) -> &Vec<Element> {
        match kind {
            ElementKind::Freehand => &self.strokes,
            ElementKind::Stamp => &self.stamps,
            ElementKind::Text => &self.labels,
        }
    }

    fn bucket_mut(&mut self, kind: ElementKind) -> &mut Vec<Element> {
        match kind {
            ElementKind::Freehand => &mut self.strokes,
            ElementKind::Stamp => &mut self.stamps,
            ElementKind::Text => &mut self.labels,
        }
    }

    fn position(&self, kind: ElementKind, id: &ElementId) -> CanvasResult<usize> {
        self.bucket(kind)
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| CanvasError::ElementNotFound(format!("{kind} {id}")))
    }

    fn notify(&mut self, change: &StoreChange) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            observer.store_changed(self, change);
        }
        // Observers subscribed from inside a callback land after the existing ones.
        observers.append(&mut self.observers);
        self.observers = observers;
    }
}

fn element_hit(element: &Element, x: f32, y: f32, radius: f32) -> bool {
    match element {
        Element::Freehand(stroke) => {
            let reach = radius + stroke.line_width / 2.0;
            any_point_within(stroke.path.iter().map(|p| (p.x, p.y)), x, y, reach)
        }
        Element::Stamp(stamp) => {
            let rect = DrawRect::centered(stamp.x, stamp.y, stamp.width, stamp.effective_height());
            circle_intersects_rect(x, y, radius, &rect)
        }
        Element::Text(label) => {
            let rect = label_extent(&label.text, label.x, label.y, label.size);
            circle_intersects_rect(x, y, radius, &rect)
        }
    }
}

/// Shorten inline payloads for log output.
fn abbreviate(src: &str) -> &str {
    const MAX: usize = 48;
    if src.len() <= MAX {
        return src;
    }
    let mut end = MAX;
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    &src[..end]
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
