//! Redraw pipeline.
//!
//! Regenerates the three data layers from the element store. Strokes and
//! labels paint synchronously; stamps paint synchronously when their bitmap
//! is cached and otherwise wait on the resolver, tagged with the stamp
//! layer generation so that a completion landing after a clear is dropped.

use std::sync::Arc;

use oral_canvas_core::{Element, ElementId, ElementKind, ElementStore, Stamp};
use serde::Serialize;

use crate::background::BackgroundOutcome;
use crate::bitmap::Bitmap;
use crate::error::RenderResult;
use crate::paint::{paint_label, paint_stamp, paint_stroke};
use crate::queue::{ImageResolver, Pending};
use crate::surface::{LayerName, LayerSurfaceSet};

/// An image that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadFailure {
    /// Image source.
    pub src: String,
    /// The stamp that referenced it; `None` for the background.
    pub element: Option<ElementId>,
    /// Loader error message.
    pub reason: String,
}

/// What applying asynchronous completions did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintReport {
    /// Stamps painted.
    pub painted: usize,
    /// Completions dropped because their target had moved on.
    pub discarded: usize,
    /// Loads that failed.
    pub failed: Vec<LoadFailure>,
    /// Outcome of the newest background request, if it finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundOutcome>,
}

impl PaintReport {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.painted == 0 && self.discarded == 0 && self.failed.is_empty() && self.background.is_none()
    }
}

/// Clear the layer of `kind` and repaint it from the store, in insertion order.
///
/// Returns how many stamps are left waiting on the resolver.
pub fn redraw_layer(
    surfaces: &mut LayerSurfaceSet,
    resolver: &mut ImageResolver,
    store: &ElementStore,
    kind: ElementKind,
) -> usize {
    surfaces.get_mut(LayerName::for_kind(kind)).clear();

    let elements = store.elements(kind);
    let queued = elements
        .iter()
        .filter(|element| !paint_element(surfaces, resolver, element))
        .count();

    tracing::debug!(
        "Redrew {kind} layer: {} elements, {queued} awaiting images",
        elements.len()
    );
    queued
}

/// Repaint all three data layers.
pub fn redraw_all(
    surfaces: &mut LayerSurfaceSet,
    resolver: &mut ImageResolver,
    store: &ElementStore,
) -> usize {
    ElementKind::ALL
        .into_iter()
        .map(|kind| redraw_layer(surfaces, resolver, store, kind))
        .sum()
}

/// Paint one element onto its layer without clearing it.
///
/// Returns `false` if the element is a stamp whose bitmap is still loading.
pub fn paint_element(
    surfaces: &mut LayerSurfaceSet,
    resolver: &mut ImageResolver,
    element: &Element,
) -> bool {
    match element {
        Element::Freehand(stroke) => {
            tracing::trace!("Painting stroke {} ({} points)", stroke.id, stroke.path.len());
            paint_stroke(surfaces.get_mut(LayerName::Freehand), stroke);
            true
        }
        Element::Stamp(stamp) => {
            let surface = surfaces.get_mut(LayerName::Stamp);
            if let Some(bitmap) = resolver.cached(&stamp.src) {
                tracing::trace!("Painting stamp {} from cache", stamp.id);
                paint_stamp(surface, stamp, &bitmap);
                true
            } else {
                let generation = surface.generation();
                resolver.request(
                    &stamp.src,
                    Pending::Stamp {
                        stamp: stamp.clone(),
                        generation,
                    },
                );
                false
            }
        }
        Element::Text(label) => {
            tracing::trace!("Painting label {}", label.id);
            if let Err(e) = paint_label(surfaces.get_mut(LayerName::Text), label) {
                tracing::warn!("Label {} not painted: {e}", label.id);
            }
            true
        }
    }
}

/// Apply a finished stamp load.
pub(crate) fn apply_stamp(
    surfaces: &mut LayerSurfaceSet,
    stamp: &Stamp,
    generation: u64,
    src: String,
    result: RenderResult<Arc<Bitmap>>,
    report: &mut PaintReport,
) {
    let surface = surfaces.get_mut(LayerName::Stamp);
    match result {
        Ok(_) if surface.generation() != generation => {
            tracing::debug!(
                "Discarding stale paint of stamp {} (generation {generation}, now {})",
                stamp.id,
                surface.generation()
            );
            report.discarded += 1;
        }
        Ok(bitmap) => {
            paint_stamp(surface, stamp, &bitmap);
            report.painted += 1;
        }
        Err(e) => {
            tracing::warn!("Stamp {} not painted, {src} failed to load: {e}", stamp.id);
            report.failed.push(LoadFailure {
                src,
                element: Some(stamp.id.clone()),
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use oral_canvas_core::{FreehandStroke, PathPoint};

    use super::*;
    use crate::cache::BitmapCache;
    use crate::loader::MemoryLoader;

    const SVG: &[u8] =
        br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><rect width="4" height="4"/></svg>"#;

    fn fixture() -> (LayerSurfaceSet, ImageResolver, ElementStore) {
        let loader = MemoryLoader::new();
        loader.insert("hook.svg", SVG.to_vec());
        (
            LayerSurfaceSet::new(100, 100).unwrap(),
            ImageResolver::new(Arc::new(loader), BitmapCache::default()),
            ElementStore::with_session_id("test"),
        )
    }

    #[test]
    fn test_redraw_reflects_removal() {
        let (mut surfaces, mut resolver, mut store) = fixture();
        let id = store
            .insert(Element::Freehand(FreehandStroke::new(
                vec![PathPoint::move_to(10.0, 10.0), PathPoint::line_to(90.0, 90.0)],
                "#000",
                3.0,
            )))
            .unwrap();
        redraw_layer(&mut surfaces, &mut resolver, &store, ElementKind::Freehand);
        assert!(!surfaces.get(LayerName::Freehand).is_blank());

        store.remove(ElementKind::Freehand, &id);
        redraw_layer(&mut surfaces, &mut resolver, &store, ElementKind::Freehand);
        assert!(surfaces.get(LayerName::Freehand).is_blank());
    }

    #[test]
    fn test_uncached_stamp_waits_then_paints() {
        let (mut surfaces, mut resolver, mut store) = fixture();
        store
            .insert(Element::Stamp(Stamp::new("hook.svg", 50.0, 50.0, 20.0, 20.0)))
            .unwrap();

        assert_eq!(redraw_all(&mut surfaces, &mut resolver, &store), 1);
        assert!(surfaces.get(LayerName::Stamp).is_blank());

        let mut report = PaintReport::default();
        for resolved in resolver.poll_ready() {
            if let Pending::Stamp { stamp, generation } = resolved.pending {
                apply_stamp(&mut surfaces, &stamp, generation, resolved.src, resolved.result, &mut report);
            }
        }
        assert_eq!(report.painted, 1);
        assert!(!surfaces.get(LayerName::Stamp).is_blank());

        // Cached now: a second redraw paints synchronously.
        assert_eq!(redraw_all(&mut surfaces, &mut resolver, &store), 0);
        assert!(!surfaces.get(LayerName::Stamp).is_blank());
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let (mut surfaces, mut resolver, mut store) = fixture();
        store
            .insert(Element::Stamp(Stamp::new("hook.svg", 50.0, 50.0, 20.0, 20.0)))
            .unwrap();
        redraw_layer(&mut surfaces, &mut resolver, &store, ElementKind::Stamp);
        surfaces.get_mut(LayerName::Stamp).clear();

        let mut report = PaintReport::default();
        for resolved in resolver.poll_ready() {
            if let Pending::Stamp { stamp, generation } = resolved.pending {
                apply_stamp(&mut surfaces, &stamp, generation, resolved.src, resolved.result, &mut report);
            }
        }
        assert_eq!(report.discarded, 1);
        assert!(surfaces.get(LayerName::Stamp).is_blank());
    }

    #[test]
    fn test_report_is_empty() {
        assert!(PaintReport::default().is_empty());
        let report = PaintReport {
            discarded: 2,
            ..PaintReport::default()
        };
        assert!(!report.is_empty());
    }
}
