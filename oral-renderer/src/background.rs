//! Background renderer.
//!
//! Owns the background layer. A background is requested, license-checked,
//! resolved, and then painted onto a white fill using the configured fit
//! policy. Only the most recent request may commit.

use std::sync::Arc;

use oral_canvas_core::{
    check_background_access, fit_rect, BackgroundConfig, BackgroundPreset, FitMethod, FitPolicy,
    LicenseTier, PresetCatalog,
};
use serde::Serialize;
use tiny_skia::Color;

use crate::bitmap::Bitmap;
use crate::error::RenderResult;
use crate::paint::draw_bitmap;
use crate::queue::{ImageResolver, Pending};
use crate::surface::LayerSurface;

/// Whether a background image is currently on the layer.
#[derive(Debug, Clone, Default)]
pub enum BackgroundState {
    /// Nothing resolved; the layer is blank or white.
    #[default]
    Empty,
    /// An image is resolved and painted.
    Loaded {
        /// Decoded image.
        bitmap: Arc<Bitmap>,
        /// Source and fit policy it was painted with.
        config: BackgroundConfig,
    },
}

/// Immediate result of a background request.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundRequest {
    /// The image was cached and is already painted.
    Committed(BackgroundConfig),
    /// The image is loading under this request number.
    Pending(u64),
}

/// Final result of a background request that had to load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum BackgroundOutcome {
    /// The background was painted.
    Committed(BackgroundConfig),
    /// The image failed to load; the layer was filled white.
    Failed {
        /// Requested source.
        src: String,
        /// Loader error message.
        reason: String,
    },
}

/// Paints the background layer and enforces the license gate.
#[derive(Debug)]
pub struct BackgroundRenderer {
    tier: LicenseTier,
    catalog: PresetCatalog,
    state: BackgroundState,
    baseline: (u32, u32),
    latest_request: u64,
}

impl BackgroundRenderer {
    /// Create a renderer for a layer of the given size.
    #[must_use]
    pub fn new(tier: LicenseTier, catalog: PresetCatalog, width: u32, height: u32) -> Self {
        Self {
            tier,
            catalog,
            state: BackgroundState::Empty,
            baseline: (width, height),
            latest_request: 0,
        }
    }

    /// Active license tier.
    #[must_use]
    pub fn license_tier(&self) -> LicenseTier {
        self.tier
    }

    /// Change the license tier. Takes effect on the next request.
    pub fn set_license_tier(&mut self, tier: LicenseTier) {
        tracing::info!("License tier set to {tier}");
        self.tier = tier;
    }

    /// Presets the active tier may select.
    #[must_use]
    pub fn available_backgrounds(&self) -> Vec<BackgroundPreset> {
        self.catalog.available(self.tier).into_iter().cloned().collect()
    }

    /// Size the layer is restored to before each paint.
    pub fn set_baseline(&mut self, width: u32, height: u32) {
        self.baseline = (width, height);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &BackgroundState {
        &self.state
    }

    /// Configuration of the painted background, if any.
    #[must_use]
    pub fn current(&self) -> Option<&BackgroundConfig> {
        match &self.state {
            BackgroundState::Loaded { config, .. } => Some(config),
            BackgroundState::Empty => None,
        }
    }

    /// Request `config` as the new background.
    ///
    /// The license gate runs first; a denied request changes nothing. A cached
    /// image is painted immediately, anything else is queued on `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::PermissionDenied`] if the tier does not
    /// allow the source, or [`crate::RenderError::Surface`] if the layer cannot
    /// be restored to its baseline size.
    pub fn set_background(
        &mut self,
        surface: &mut LayerSurface,
        resolver: &mut ImageResolver,
        config: BackgroundConfig,
    ) -> RenderResult<BackgroundRequest> {
        check_background_access(self.tier, &self.catalog, &config.src)?;
        self.prepare(surface)?;

        self.latest_request += 1;
        let request = self.latest_request;

        if let Some(bitmap) = resolver.cached(&config.src) {
            self.commit(surface, bitmap, config.clone());
            return Ok(BackgroundRequest::Committed(config));
        }

        tracing::debug!("Background request {request} loading");
        let src = config.src.clone();
        resolver.request(&src, Pending::Background { request, config });
        Ok(BackgroundRequest::Pending(request))
    }

    /// Load a stored configuration, falling back to white if it is not allowed.
    ///
    /// Returns `None` when the layer was filled white instead.
    pub fn load_configured(
        &mut self,
        surface: &mut LayerSurface,
        resolver: &mut ImageResolver,
        config: BackgroundConfig,
    ) -> Option<BackgroundRequest> {
        match self.set_background(surface, resolver, config) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::warn!("Background not loaded, using white: {e}");
                self.latest_request += 1;
                self.fall_back_to_white(surface);
                None
            }
        }
    }

    /// Apply a finished load. Superseded requests return `None`.
    pub(crate) fn complete(
        &mut self,
        surface: &mut LayerSurface,
        request: u64,
        config: BackgroundConfig,
        result: RenderResult<Arc<Bitmap>>,
    ) -> Option<BackgroundOutcome> {
        if request != self.latest_request {
            tracing::debug!(
                "Ignoring superseded background request {request} (latest {})",
                self.latest_request
            );
            return None;
        }
        match result {
            Ok(bitmap) => {
                self.commit(surface, bitmap, config.clone());
                Some(BackgroundOutcome::Committed(config))
            }
            Err(e) => {
                tracing::warn!("Background failed to load, using white: {e}");
                self.fall_back_to_white(surface);
                Some(BackgroundOutcome::Failed {
                    src: config.src,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Repaint the held image against the layer's current size using contain.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Surface`] if the layer cannot be restored to
    /// its baseline size.
    pub fn resize_background(&mut self, surface: &mut LayerSurface) -> RenderResult<()> {
        self.prepare(surface)?;
        match &self.state {
            BackgroundState::Loaded { bitmap, config } => {
                let policy = FitPolicy::new(FitMethod::Contain);
                paint_fitted(surface, bitmap, policy);
                tracing::debug!("Background {} refitted with contain", abbreviate(&config.src));
            }
            BackgroundState::Empty => surface.fill(Color::WHITE),
        }
        Ok(())
    }

    fn prepare(&self, surface: &mut LayerSurface) -> RenderResult<()> {
        let (width, height) = self.baseline;
        if (surface.width(), surface.height()) != (width, height) {
            surface.resize(width, height)?;
        }
        Ok(())
    }

    fn commit(&mut self, surface: &mut LayerSurface, bitmap: Arc<Bitmap>, config: BackgroundConfig) {
        paint_fitted(surface, &bitmap, config.options);
        tracing::info!(
            "Background {} painted ({}x{}, {:?})",
            abbreviate(&config.src),
            bitmap.width(),
            bitmap.height(),
            config.options.fit_method
        );
        self.state = BackgroundState::Loaded { bitmap, config };
    }

    fn fall_back_to_white(&mut self, surface: &mut LayerSurface) {
        surface.fill(Color::WHITE);
        self.state = BackgroundState::Empty;
    }
}

#[allow(clippy::cast_precision_loss)]
fn paint_fitted(surface: &mut LayerSurface, bitmap: &Bitmap, policy: FitPolicy) {
    surface.fill(Color::WHITE);
    let rect = fit_rect(
        surface.size_f32(),
        (bitmap.width() as f32, bitmap.height() as f32),
        policy,
    );
    draw_bitmap(surface, bitmap, &rect);
}

fn abbreviate(src: &str) -> &str {
    if src.starts_with("data:") {
        src.split(',').next().unwrap_or("data:")
    } else {
        src
    }
}

#[cfg(test)]
mod tests {
    use oral_canvas_core::{BackgroundOptions, DEFAULT_BACKGROUND};

    use super::*;
    use crate::cache::BitmapCache;
    use crate::error::RenderError;
    use crate::loader::MemoryLoader;
    use crate::surface::LayerName;

    /// 40x40 solid blue square.
    const SQUARE: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40"><rect width="40" height="40" fill="blue"/></svg>"#;

    fn fixture(tier: LicenseTier) -> (BackgroundRenderer, LayerSurface, ImageResolver, MemoryLoader) {
        let loader = MemoryLoader::new();
        loader.insert(DEFAULT_BACKGROUND, SQUARE.to_vec());
        loader.insert("Tool/Backgrounds/perio_chart.svg", SQUARE.to_vec());
        (
            BackgroundRenderer::new(tier, PresetCatalog::default(), 80, 40),
            LayerSurface::new(LayerName::Background, 80, 40).unwrap(),
            ImageResolver::new(Arc::new(loader.clone()), BitmapCache::default()),
            loader,
        )
    }

    fn finish(renderer: &mut BackgroundRenderer, surface: &mut LayerSurface, resolver: &mut ImageResolver) -> Vec<BackgroundOutcome> {
        resolver
            .poll_ready()
            .into_iter()
            .filter_map(|resolved| match resolved.pending {
                Pending::Background { request, config } => {
                    renderer.complete(surface, request, config, resolved.result)
                }
                Pending::Stamp { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_contain_letterboxes_on_white() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Free);
        let config = BackgroundConfig::new(DEFAULT_BACKGROUND, BackgroundOptions::default());
        let request = renderer
            .set_background(&mut surface, &mut resolver, config)
            .unwrap();
        assert_eq!(request, BackgroundRequest::Pending(1));

        let outcomes = finish(&mut renderer, &mut surface, &mut resolver);
        assert!(matches!(outcomes.as_slice(), [BackgroundOutcome::Committed(_)]));

        let side = surface.pixmap().pixel(5, 20).unwrap();
        assert_eq!((side.red(), side.blue()), (255, 255));
        let middle = surface.pixmap().pixel(40, 20).unwrap();
        assert_eq!((middle.red(), middle.blue()), (0, 255));
        assert!(renderer.current().is_some());
    }

    #[test]
    fn test_free_tier_denied_without_pixel_change() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Free);
        let custom = BackgroundConfig::new(
            "data:image/svg+xml,%3Csvg/%3E",
            BackgroundOptions::default(),
        );
        let result = renderer.set_background(&mut surface, &mut resolver, custom);
        assert!(matches!(result, Err(RenderError::PermissionDenied(_))));
        assert!(surface.is_blank());
        assert_eq!(resolver.in_flight(), 0);

        let premium = BackgroundConfig::new(
            "Tool/Backgrounds/perio_chart.svg",
            BackgroundOptions::default(),
        );
        assert!(renderer.set_background(&mut surface, &mut resolver, premium.clone()).is_err());

        renderer.set_license_tier(LicenseTier::Premium);
        assert!(renderer.set_background(&mut surface, &mut resolver, premium).is_ok());
    }

    #[test]
    fn test_latest_request_wins() {
        let (mut renderer, mut surface, mut resolver, loader) = fixture(LicenseTier::Premium);
        loader.hold(DEFAULT_BACKGROUND);

        let first = BackgroundConfig::new(DEFAULT_BACKGROUND, BackgroundOptions::default());
        let second = BackgroundConfig::new(
            "Tool/Backgrounds/perio_chart.svg",
            BackgroundOptions::fit(FitMethod::Stretch),
        );
        renderer.set_background(&mut surface, &mut resolver, first).unwrap();
        renderer.set_background(&mut surface, &mut resolver, second.clone()).unwrap();

        let outcomes = finish(&mut renderer, &mut surface, &mut resolver);
        assert_eq!(outcomes, vec![BackgroundOutcome::Committed(second.clone())]);

        loader.release(DEFAULT_BACKGROUND);
        assert!(finish(&mut renderer, &mut surface, &mut resolver).is_empty());
        assert_eq!(renderer.current(), Some(&second));
    }

    #[test]
    fn test_failed_load_fills_white() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Premium);
        let missing = BackgroundConfig::new("Tool/missing.svg", BackgroundOptions::default());
        renderer.set_background(&mut surface, &mut resolver, missing).unwrap();

        let outcomes = finish(&mut renderer, &mut surface, &mut resolver);
        assert!(matches!(outcomes.as_slice(), [BackgroundOutcome::Failed { .. }]));
        let px = surface.pixmap().pixel(40, 20).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 255, 255, 255));
        assert!(matches!(renderer.state(), BackgroundState::Empty));
    }

    #[test]
    fn test_cached_background_commits_synchronously() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Free);
        let config = BackgroundConfig::new(DEFAULT_BACKGROUND, BackgroundOptions::default());
        renderer.set_background(&mut surface, &mut resolver, config.clone()).unwrap();
        finish(&mut renderer, &mut surface, &mut resolver);

        let again = renderer.set_background(&mut surface, &mut resolver, config.clone()).unwrap();
        assert_eq!(again, BackgroundRequest::Committed(config));
    }

    #[test]
    fn test_resize_refits_held_image() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Free);
        let config = BackgroundConfig::new(DEFAULT_BACKGROUND, BackgroundOptions::fit(FitMethod::Cover));
        renderer.set_background(&mut surface, &mut resolver, config).unwrap();
        finish(&mut renderer, &mut surface, &mut resolver);

        renderer.set_baseline(40, 80);
        renderer.resize_background(&mut surface).unwrap();
        assert_eq!((surface.width(), surface.height()), (40, 80));
        let top = surface.pixmap().pixel(20, 5).unwrap();
        assert_eq!((top.red(), top.blue()), (255, 255));
        let middle = surface.pixmap().pixel(20, 40).unwrap();
        assert_eq!((middle.red(), middle.blue()), (0, 255));
    }

    #[test]
    fn test_denied_stored_background_falls_back_to_white() {
        let (mut renderer, mut surface, mut resolver, _) = fixture(LicenseTier::Free);
        let premium = BackgroundConfig::new(
            "Tool/Backgrounds/perio_chart.svg",
            BackgroundOptions::default(),
        );
        assert!(renderer.load_configured(&mut surface, &mut resolver, premium).is_none());
        assert_eq!(surface.pixmap().pixel(0, 0).unwrap().alpha(), 255);
    }
}
