//! Layer compositor.
//!
//! Owns the five layer surfaces, the background renderer, and the image
//! resolver. Surface pixels are derived state; the element store passed to
//! each call is the source of truth. Nothing here fails the caller over a
//! single layer or element: unknown layer names and failed loads are logged
//! and skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use oral_canvas_core::{
    BackgroundConfig, BackgroundPreset, CanvasConfig, Element, ElementKind, ElementStore,
    LicenseTier,
};

use crate::background::{BackgroundRenderer, BackgroundRequest, BackgroundState};
use crate::cache::{BitmapCache, CacheStats};
use crate::error::RenderResult;
use crate::export::{merge_visible, ExportConfig};
use crate::loader::ImageLoader;
use crate::pipeline::{self, PaintReport};
use crate::queue::{ImageResolver, Pending, Resolved};
use crate::surface::{LayerName, LayerSurface, LayerSurfaceSet};

/// Layer surfaces plus everything that paints them.
#[derive(Debug)]
pub struct LayerCompositor {
    surfaces: LayerSurfaceSet,
    background: BackgroundRenderer,
    resolver: ImageResolver,
}

impl LayerCompositor {
    /// Create blank surfaces at the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Surface`] if the configured size is zero.
    pub fn new(config: &CanvasConfig, loader: Arc<dyn ImageLoader>) -> RenderResult<Self> {
        let surfaces = LayerSurfaceSet::new(config.width, config.height)?;
        tracing::info!(
            "Compositor created: {}x{}, {} tier",
            config.width,
            config.height,
            config.license_tier
        );
        Ok(Self {
            surfaces,
            background: BackgroundRenderer::new(
                config.license_tier,
                config.presets.clone(),
                config.width,
                config.height,
            ),
            resolver: ImageResolver::new(loader, BitmapCache::new(config.cache)),
        })
    }

    // -----------------------------------------------------------------------
    // Surfaces
    // -----------------------------------------------------------------------

    /// Resize every surface, then repaint the background and the data layers.
    ///
    /// Stamps whose bitmaps are not cached finish painting on a later
    /// [`LayerCompositor::pump`] or [`LayerCompositor::settle`].
    pub fn resize_all(&mut self, store: &ElementStore, width: u32, height: u32) {
        if let Err(e) = self.surfaces.resize_all(width, height) {
            tracing::error!("Resize ignored: {e}");
            return;
        }
        tracing::info!("Resized layers to {width}x{height}");
        self.background.set_baseline(width, height);
        self.resize_background();
        self.redraw_all(store);
    }

    /// Clear one layer by host name. Unknown names are logged and ignored.
    pub fn clear_layer(&mut self, name: &str) {
        match name.parse::<LayerName>() {
            Ok(layer) => self.clear(layer),
            Err(e) => tracing::error!("clear_layer: {e}"),
        }
    }

    /// Clear one layer's pixels. The store is not touched.
    pub fn clear(&mut self, layer: LayerName) {
        self.surfaces.get_mut(layer).clear();
        tracing::debug!("Cleared {layer} layer");
    }

    /// Clear every layer except the background.
    pub fn clear_all_except_background(&mut self) {
        for layer in LayerName::ALL {
            if layer != LayerName::Background {
                self.surfaces.get_mut(layer).clear();
            }
        }
        tracing::debug!("Cleared all layers except background");
    }

    /// Regenerate the three data layers from `store`.
    ///
    /// Returns how many stamps are waiting on image loads.
    pub fn redraw_all(&mut self, store: &ElementStore) -> usize {
        pipeline::redraw_all(&mut self.surfaces, &mut self.resolver, store)
    }

    /// Regenerate one data layer from `store`.
    pub fn redraw_layer(&mut self, store: &ElementStore, kind: ElementKind) -> usize {
        pipeline::redraw_layer(&mut self.surfaces, &mut self.resolver, store, kind)
    }

    /// Paint a single element on top of its layer's current content.
    ///
    /// Returns `false` if the element is a stamp still waiting on its image.
    pub fn paint_element(&mut self, element: &Element) -> bool {
        pipeline::paint_element(&mut self.surfaces, &mut self.resolver, element)
    }

    /// Flatten the visible exported layers and encode them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Export`] if flattening or encoding fails.
    pub fn merge_visible_to_image(&self, config: &ExportConfig) -> RenderResult<Vec<u8>> {
        merge_visible(&self.surfaces, config)
    }

    /// Set a layer's visibility flag by host name. Nothing is repainted.
    ///
    /// Returns `false` for an unknown layer name.
    pub fn set_layer_visibility(&mut self, name: &str, visible: bool) -> bool {
        match name.parse::<LayerName>() {
            Ok(layer) => {
                self.surfaces.get_mut(layer).set_visible(visible);
                tracing::debug!("Layer {layer} visible: {visible}");
                true
            }
            Err(e) => {
                tracing::error!("set_layer_visibility: {e}");
                false
            }
        }
    }

    /// Visibility flag per layer.
    #[must_use]
    pub fn visibility(&self) -> BTreeMap<LayerName, bool> {
        self.surfaces.visibility()
    }

    /// The layer surfaces.
    #[must_use]
    pub fn surfaces(&self) -> &LayerSurfaceSet {
        &self.surfaces
    }

    /// The overlay surface, for transient interaction chrome.
    pub fn overlay_mut(&mut self) -> &mut LayerSurface {
        self.surfaces.get_mut(LayerName::Overlay)
    }

    /// Shared surface width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.surfaces.width()
    }

    /// Shared surface height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.surfaces.height()
    }

    // -----------------------------------------------------------------------
    // Background
    // -----------------------------------------------------------------------

    /// Request a new background.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::PermissionDenied`] if the license tier does
    /// not allow the source; no pixels change in that case.
    pub fn set_background(&mut self, config: BackgroundConfig) -> RenderResult<BackgroundRequest> {
        let surface = self.surfaces.get_mut(LayerName::Background);
        self.background
            .set_background(surface, &mut self.resolver, config)
    }

    /// Load a stored background, falling back to white when it is not allowed.
    pub fn load_background(&mut self, config: BackgroundConfig) -> Option<BackgroundRequest> {
        let surface = self.surfaces.get_mut(LayerName::Background);
        self.background
            .load_configured(surface, &mut self.resolver, config)
    }

    /// Refit the held background to the current surface size.
    pub fn resize_background(&mut self) {
        let surface = self.surfaces.get_mut(LayerName::Background);
        if let Err(e) = self.background.resize_background(surface) {
            tracing::error!("Background resize failed: {e}");
        }
    }

    /// Background renderer state.
    #[must_use]
    pub fn background_state(&self) -> &BackgroundState {
        self.background.state()
    }

    /// Active license tier.
    #[must_use]
    pub fn license_tier(&self) -> LicenseTier {
        self.background.license_tier()
    }

    /// Change the license tier.
    pub fn set_license_tier(&mut self, tier: LicenseTier) {
        self.background.set_license_tier(tier);
    }

    /// Presets the active tier may select.
    #[must_use]
    pub fn available_backgrounds(&self) -> Vec<BackgroundPreset> {
        self.background.available_backgrounds()
    }

    // -----------------------------------------------------------------------
    // Asynchronous completions
    // -----------------------------------------------------------------------

    /// Apply every image load that has already finished, without waiting.
    pub fn pump(&mut self) -> PaintReport {
        let mut report = PaintReport::default();
        for resolved in self.resolver.poll_ready() {
            self.apply(resolved, &mut report);
        }
        report
    }

    /// Wait for every in-flight image load and apply it.
    pub async fn settle(&mut self) -> PaintReport {
        let mut report = PaintReport::default();
        while let Some(resolved) = self.resolver.next().await {
            self.apply(resolved, &mut report);
        }
        if !report.is_empty() {
            tracing::debug!(
                "Settled: {} painted, {} discarded, {} failed",
                report.painted,
                report.discarded,
                report.failed.len()
            );
        }
        report
    }

    fn apply(&mut self, resolved: Resolved, report: &mut PaintReport) {
        let Resolved {
            pending,
            src,
            result,
        } = resolved;
        match pending {
            Pending::Stamp { stamp, generation } => {
                pipeline::apply_stamp(&mut self.surfaces, &stamp, generation, src, result, report);
            }
            Pending::Background { request, config } => {
                let surface = self.surfaces.get_mut(LayerName::Background);
                match self.background.complete(surface, request, config, result) {
                    Some(outcome) => report.background = Some(outcome),
                    None => report.discarded += 1,
                }
            }
        }
    }

    /// Number of image loads still pending.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.resolver.in_flight()
    }

    /// Bitmap cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> &CacheStats {
        self.resolver.cache_stats()
    }
}
