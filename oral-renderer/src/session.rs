//! Canvas session: one element store wired to one compositor.
//!
//! The session is constructed once and handed to whatever drives it (tools,
//! the host bridge, the CLI). Every store mutation is followed by the
//! matching repaint, so layer pixels track the store.

use std::sync::Arc;

use oral_canvas_core::{
    AdvisoryPersistence, BackgroundConfig, BackgroundOptions, CanvasConfig, CanvasResult,
    CoordinateMapper, ElementId, ElementKind, ElementStore, FileRecoverySlot, IdentityMapper,
    LicenseTier, RecoverySlot, Snapshot,
};

use crate::background::{BackgroundOutcome, BackgroundRequest};
use crate::compositor::LayerCompositor;
use crate::error::RenderResult;
use crate::export::{to_data_url, ExportConfig};
use crate::loader::{AssetLoader, ImageLoader};
use crate::pipeline::PaintReport;

/// An element store, its compositor, and the boundary coordinate hook.
pub struct CanvasSession {
    store: ElementStore,
    compositor: LayerCompositor,
    export: ExportConfig,
    mapper: Box<dyn CoordinateMapper>,
}

impl std::fmt::Debug for CanvasSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSession")
            .field("store", &self.store)
            .field("compositor", &self.compositor)
            .field("export", &self.export)
            .finish_non_exhaustive()
    }
}

impl CanvasSession {
    /// Create a session that loads images from the configured asset root.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: CanvasConfig) -> RenderResult<Self> {
        let loader = Arc::new(AssetLoader::new(config.asset_root.clone()));
        Self::with_loader(config, loader)
    }

    /// Create a session with a custom image loader.
    ///
    /// When the configuration names a recovery directory, the last recovery
    /// record is restored and every later change is saved back.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_loader(config: CanvasConfig, loader: Arc<dyn ImageLoader>) -> RenderResult<Self> {
        let slot: Option<Arc<dyn RecoverySlot>> = match &config.recovery_dir {
            Some(dir) => match FileRecoverySlot::new(dir) {
                Ok(slot) => Some(Arc::new(slot)),
                Err(e) => {
                    tracing::warn!("Recovery disabled: {e}");
                    None
                }
            },
            None => None,
        };
        Self::with_recovery(config, loader, slot)
    }

    /// Create a session with an explicit recovery slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_recovery(
        config: CanvasConfig,
        loader: Arc<dyn ImageLoader>,
        slot: Option<Arc<dyn RecoverySlot>>,
    ) -> RenderResult<Self> {
        config.validate()?;

        let mut store = ElementStore::new();
        if let Some(slot) = slot {
            let persistence = AdvisoryPersistence::new(slot, config.recovery_key.clone());
            persistence.restore(&mut store);
            store.subscribe(Box::new(persistence));
        }

        let mut compositor = LayerCompositor::new(&config, loader)?;
        compositor.load_background(store.background().clone());
        compositor.redraw_all(&store);

        tracing::info!("Canvas session {} ready", store.session_id());
        Ok(Self {
            store,
            compositor,
            export: ExportConfig::from(&config),
            mapper: Box::new(IdentityMapper),
        })
    }

    /// The element store.
    #[must_use]
    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    /// The compositor.
    #[must_use]
    pub fn compositor(&self) -> &LayerCompositor {
        &self.compositor
    }

    /// Mutable compositor, for tools that draw on the overlay.
    pub fn compositor_mut(&mut self) -> &mut LayerCompositor {
        &mut self.compositor
    }

    // -----------------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------------

    /// Add an element from host JSON and paint it.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown type name or an unusable payload.
    pub fn add_element(&mut self, type_name: &str, data: serde_json::Value) -> RenderResult<ElementId> {
        let id = self.store.add_element(type_name, data)?;
        let kind: ElementKind = type_name.parse()?;
        if let Some(element) = self.store.get(kind, &id) {
            self.compositor.paint_element(element);
        }
        Ok(id)
    }

    /// Merge host JSON into an element and repaint its layer.
    pub fn update_element(&mut self, type_name: &str, id: &str, data: serde_json::Value) -> bool {
        let updated = self.store.update_element(type_name, id, data);
        if updated {
            self.redraw_named_layer(type_name);
        }
        updated
    }

    /// Remove an element and repaint its layer.
    pub fn remove_element(&mut self, type_name: &str, id: &str) -> bool {
        let removed = self.store.remove_element(type_name, id);
        if removed {
            self.redraw_named_layer(type_name);
        }
        removed
    }

    /// Remove every element of one type.
    pub fn clear_elements(&mut self, type_name: &str) -> bool {
        let cleared = self.store.clear_elements_by_type(type_name);
        if cleared {
            self.redraw_named_layer(type_name);
        }
        cleared
    }

    /// Remove everything and restore the default background.
    pub fn clear_all(&mut self) {
        self.store.clear_all();
        self.compositor.clear_all_except_background();
        self.compositor.load_background(self.store.background().clone());
    }

    /// Erase every element of `kind` under a hit circle given in canvas
    /// coordinates. Returns the removed ids.
    pub fn erase_at(&mut self, kind: ElementKind, x: f32, y: f32, radius: f32) -> Vec<ElementId> {
        let removed = self.store.remove_elements_at(kind, x, y, radius);
        if !removed.is_empty() {
            self.compositor.redraw_layer(&self.store, kind);
        }
        removed
    }

    fn redraw_named_layer(&mut self, type_name: &str) {
        if let Ok(kind) = type_name.parse::<ElementKind>() {
            self.compositor.redraw_layer(&self.store, kind);
        }
    }

    // -----------------------------------------------------------------------
    // Background
    // -----------------------------------------------------------------------

    /// Request a new background. `options` are merged onto the current policy.
    ///
    /// The store records the background once it has been painted: right away
    /// for cached images, otherwise when [`CanvasSession::pump`] or
    /// [`CanvasSession::settle`] reports the commit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::PermissionDenied`] if the license tier does
    /// not allow `src`.
    pub fn set_background(
        &mut self,
        src: &str,
        options: BackgroundOptions,
    ) -> RenderResult<BackgroundRequest> {
        let config = BackgroundConfig {
            src: src.to_string(),
            options: options.merged_onto(self.store.background().options),
        };
        let request = self.compositor.set_background(config)?;
        if let BackgroundRequest::Committed(config) = &request {
            self.record_background(config);
        }
        Ok(request)
    }

    fn record_background(&mut self, config: &BackgroundConfig) {
        if self.store.background() != config {
            self.store
                .set_background(config.src.clone(), BackgroundOptions::from(config.options));
        }
    }

    /// Active license tier.
    #[must_use]
    pub fn license_tier(&self) -> LicenseTier {
        self.compositor.license_tier()
    }

    /// Change the license tier.
    pub fn set_license_tier(&mut self, tier: LicenseTier) {
        self.compositor.set_license_tier(tier);
    }

    // -----------------------------------------------------------------------
    // Surfaces
    // -----------------------------------------------------------------------

    /// Resize every layer and rebuild it from the store.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.compositor.resize_all(&self.store, width, height);
    }

    /// Rebuild the data layers from the store.
    pub fn redraw(&mut self) -> usize {
        self.compositor.redraw_all(&self.store)
    }

    /// Apply finished image loads without waiting.
    pub fn pump(&mut self) -> PaintReport {
        let report = self.compositor.pump();
        self.absorb(&report);
        report
    }

    /// Wait for all image loads and apply them.
    pub async fn settle(&mut self) -> PaintReport {
        let report = self.compositor.settle().await;
        self.absorb(&report);
        report
    }

    fn absorb(&mut self, report: &PaintReport) {
        if let Some(BackgroundOutcome::Committed(config)) = &report.background {
            self.record_background(config);
        }
    }

    // -----------------------------------------------------------------------
    // Export and import
    // -----------------------------------------------------------------------

    /// Export settings.
    #[must_use]
    pub fn export_config(&self) -> &ExportConfig {
        &self.export
    }

    /// Replace the export settings.
    pub fn set_export_config(&mut self, export: ExportConfig) {
        self.export = export;
    }

    /// Flatten the visible layers into an encoded image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Export`] if encoding fails.
    pub fn export_image(&self) -> RenderResult<Vec<u8>> {
        self.compositor.merge_visible_to_image(&self.export)
    }

    /// Flatten the visible layers into a `data:` URL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Export`] if encoding fails.
    pub fn export_data_url(&self) -> RenderResult<String> {
        let bytes = self.export_image()?;
        Ok(to_data_url(&bytes, self.export.format))
    }

    /// Snapshot of the store.
    #[must_use]
    pub fn export_snapshot(&self) -> Snapshot {
        self.store.export_snapshot()
    }

    /// Snapshot of the store as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> CanvasResult<String> {
        self.store.export_json()
    }

    /// Replace the store from host JSON and repaint everything.
    ///
    /// # Errors
    ///
    /// Returns [`oral_canvas_core::CanvasError::MalformedSnapshot`] on unparsable
    /// input; neither the store nor the layers change in that case.
    pub fn import_snapshot(&mut self, json: &str) -> RenderResult<()> {
        self.store.import_snapshot(json)?;
        self.reload();
        Ok(())
    }

    /// Replace the store with `snapshot` and repaint everything.
    pub fn import(&mut self, snapshot: Snapshot) {
        self.store.import(snapshot);
        self.reload();
    }

    fn reload(&mut self) {
        self.compositor.clear_all_except_background();
        self.compositor.load_background(self.store.background().clone());
        self.compositor.redraw_all(&self.store);
    }

    // -----------------------------------------------------------------------
    // Coordinates
    // -----------------------------------------------------------------------

    /// Install the host's coordinate mapping.
    pub fn set_coordinate_mapper(&mut self, mapper: Box<dyn CoordinateMapper>) {
        self.mapper = mapper;
    }

    /// Map a host pointer position into canvas pixels.
    #[must_use]
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        self.mapper.to_canvas(x, y)
    }
}

#[cfg(test)]
mod tests {
    use oral_canvas_core::{FitMethod, MemoryRecoverySlot, DEFAULT_BACKGROUND};
    use serde_json::json;

    use super::*;
    use crate::loader::MemoryLoader;
    use crate::surface::LayerName;

    const SQUARE: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="green"/></svg>"#;

    fn session() -> (CanvasSession, MemoryLoader) {
        let loader = MemoryLoader::new();
        loader.insert(DEFAULT_BACKGROUND, SQUARE.to_vec());
        loader.insert("Tool/Stamps/hook.svg", SQUARE.to_vec());
        let config = CanvasConfig {
            width: 120,
            height: 80,
            ..CanvasConfig::default()
        };
        let session = CanvasSession::with_loader(config, Arc::new(loader.clone())).unwrap();
        (session, loader)
    }

    #[test]
    fn test_add_paints_incrementally() {
        let (mut session, _) = session();
        session
            .add_element(
                "freedraw",
                json!({ "path": [{ "x": 10, "y": 10, "type": "moveTo" }, { "x": 100, "y": 70 }], "color": "#f00", "lineWidth": 4 }),
            )
            .unwrap();
        assert!(!session.compositor().surfaces().get(LayerName::Freehand).is_blank());
        assert!(session.add_element("bogus", json!({})).is_err());
    }

    #[test]
    fn test_remove_repaints_layer() {
        let (mut session, _) = session();
        let id = session
            .add_element("text", json!({ "text": "N", "x": 10, "y": 40, "size": 20 }))
            .unwrap();
        assert!(session.remove_element("text", id.as_str()));
        assert!(!session.remove_element("text", id.as_str()));
        assert!(session.compositor().surfaces().get(LayerName::Text).is_blank());
    }

    #[test]
    fn test_pending_background_recorded_on_commit() {
        let (mut session, _) = session();
        session.pump();
        let request = session
            .set_background("Tool/WhiteBack.svg", BackgroundOptions::fit(FitMethod::Cover))
            .unwrap();
        assert!(matches!(request, BackgroundRequest::Pending(_)));
        assert_eq!(session.store().background().src, DEFAULT_BACKGROUND);

        // WhiteBack.svg is not registered, so the load fails and nothing is recorded.
        let report = session.pump();
        assert!(matches!(report.background, Some(BackgroundOutcome::Failed { .. })));
        assert_eq!(session.store().background().src, DEFAULT_BACKGROUND);

        let request = session
            .set_background(DEFAULT_BACKGROUND, BackgroundOptions::fit(FitMethod::Cover))
            .unwrap();
        assert!(matches!(request, BackgroundRequest::Committed(_)));
        assert_eq!(session.store().background().options.fit_method, FitMethod::Cover);
    }

    #[test]
    fn test_recovery_round_trip() {
        let slot: Arc<dyn RecoverySlot> = Arc::new(MemoryRecoverySlot::new());
        let loader: Arc<dyn ImageLoader> = Arc::new(MemoryLoader::new());

        let mut first =
            CanvasSession::with_recovery(CanvasConfig::default(), Arc::clone(&loader), Some(Arc::clone(&slot)))
                .unwrap();
        first
            .add_element("stamp", json!({ "src": "Tool/Stamps/hook.svg", "x": 5, "y": 5, "width": 10 }))
            .unwrap();

        let second =
            CanvasSession::with_recovery(CanvasConfig::default(), loader, Some(slot)).unwrap();
        assert_eq!(second.store().len(), 1);
        assert_eq!(second.store().session_id(), first.store().session_id());
    }

    #[test]
    fn test_malformed_import_changes_nothing() {
        let (mut session, _) = session();
        session
            .add_element("text", json!({ "text": "M", "x": 10, "y": 40 }))
            .unwrap();
        assert!(session.import_snapshot("{ nope").is_err());
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().elements(ElementKind::Text).len(), 1);
    }

    #[test]
    fn test_map_point_uses_installed_mapper() {
        let (mut session, _) = session();
        assert_eq!(session.map_point(3.0, 4.0), (3.0, 4.0));
        session.set_coordinate_mapper(Box::new(oral_canvas_core::ViewportMapper {
            display: oral_canvas_core::DrawRect {
                x: 0.0,
                y: 0.0,
                width: 60.0,
                height: 40.0,
            },
            canvas_width: 120.0,
            canvas_height: 80.0,
        }));
        assert_eq!(session.map_point(3.0, 4.0), (6.0, 8.0));
    }
}
