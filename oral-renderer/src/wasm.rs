//! WebAssembly bindings.
//!
//! Exposes the [`CanvasHost`] surface to JavaScript. Images are supplied by
//! the page as `data:` URIs or registered bytes, since the module has no
//! filesystem. Labels use the bundled face unless the page registers more
//! fonts with `registerFont`.

use std::sync::Arc;

use oral_canvas_core::CanvasConfig;
use wasm_bindgen::prelude::*;

use crate::host::CanvasHost;
use crate::loader::MemoryLoader;
use crate::session::CanvasSession;

/// Initialize the canvas WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&JsValue::from_str("OralCanvas WASM initialized"));
}

/// Canvas instance for WASM.
#[wasm_bindgen]
pub struct WasmCanvas {
    session: CanvasSession,
    assets: MemoryLoader,
}

#[wasm_bindgen]
impl WasmCanvas {
    /// Create a canvas from a JSON configuration (may be empty).
    ///
    /// # Errors
    ///
    /// Returns an error string if the configuration is invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmCanvas, String> {
        let config = if config_json.trim().is_empty() {
            CanvasConfig::default()
        } else {
            CanvasConfig::from_json(config_json).map_err(|e| e.to_string())?
        };
        let assets = MemoryLoader::new();
        let session = CanvasSession::with_recovery(config, Arc::new(assets.clone()), None)
            .map_err(|e| e.to_string())?;
        Ok(Self { session, assets })
    }

    /// Register encoded image bytes under a preset path.
    #[wasm_bindgen(js_name = registerAsset)]
    pub fn register_asset(&mut self, path: &str, bytes: &[u8]) {
        self.assets.insert(path, bytes.to_vec());
    }

    /// Register TTF/OTF font bytes; returns the added family names as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if the bytes hold no usable font face.
    #[wasm_bindgen(js_name = registerFont)]
    pub fn register_font(&mut self, bytes: &[u8]) -> Result<String, String> {
        let families = crate::fonts::register_font(bytes.to_vec()).map_err(|e| e.to_string())?;
        serde_json::to_string(&families).map_err(|e| e.to_string())
    }

    /// Add an element; returns its id, or `undefined` on failure.
    #[wasm_bindgen(js_name = addElement)]
    pub fn add_element(&mut self, type_name: &str, data_json: &str) -> Option<String> {
        CanvasHost::add_element(&mut self.session, type_name, data_json)
    }

    /// Merge JSON into an element.
    #[wasm_bindgen(js_name = updateElement)]
    pub fn update_element(&mut self, type_name: &str, id: &str, data_json: &str) -> bool {
        CanvasHost::update_element(&mut self.session, type_name, id, data_json)
    }

    /// Remove an element.
    #[wasm_bindgen(js_name = removeElement)]
    pub fn remove_element(&mut self, type_name: &str, id: &str) -> bool {
        CanvasHost::remove_element(&mut self.session, type_name, id)
    }

    /// Remove every element of a type.
    #[wasm_bindgen(js_name = clearElementsByType)]
    pub fn clear_elements_by_type(&mut self, type_name: &str) -> bool {
        CanvasHost::clear_elements(&mut self.session, type_name)
    }

    /// Remove everything.
    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&mut self) {
        CanvasHost::clear_all(&mut self.session);
    }

    /// Erase elements under a hit circle in page coordinates.
    #[wasm_bindgen(js_name = eraseAt)]
    pub fn erase_at(&mut self, type_name: &str, x: f32, y: f32, radius: f32) -> usize {
        CanvasHost::erase_at(&mut self.session, type_name, x, y, radius)
    }

    /// Resize all layers.
    #[wasm_bindgen(js_name = resizeAll)]
    pub fn resize_all(&mut self, width: u32, height: u32) {
        CanvasHost::resize(&mut self.session, width, height);
    }

    /// Rebuild the data layers.
    #[wasm_bindgen(js_name = redrawAll)]
    pub fn redraw_all(&mut self) {
        CanvasHost::redraw(&mut self.session);
    }

    /// Apply finished image loads; returns the paint report as JSON.
    pub fn pump(&mut self) -> String {
        CanvasHost::pump(&mut self.session)
    }

    /// Export the flattened image as a `data:` URL.
    #[wasm_bindgen(js_name = exportImage)]
    #[must_use]
    pub fn export_image(&self) -> Option<String> {
        self.session.export_image_data_url()
    }

    /// Export the snapshot as JSON.
    #[wasm_bindgen(js_name = exportSnapshot)]
    #[must_use]
    pub fn export_snapshot(&self) -> Option<String> {
        self.session.export_snapshot_json()
    }

    /// Import a snapshot.
    #[wasm_bindgen(js_name = importSnapshot)]
    pub fn import_snapshot(&mut self, json: &str) -> bool {
        self.session.import_snapshot_json(json)
    }

    /// Request a background.
    ///
    /// # Errors
    ///
    /// Returns an error string if the license tier does not allow `src`.
    #[wasm_bindgen(js_name = setBackground)]
    pub fn set_background(&mut self, src: &str, options_json: &str) -> Result<(), String> {
        CanvasHost::set_background(&mut self.session, src, options_json)
    }

    /// Set the license tier.
    #[wasm_bindgen(js_name = setLicenseTier)]
    pub fn set_license_tier(&mut self, tier: &str) -> bool {
        CanvasHost::set_license_tier(&mut self.session, tier)
    }

    /// Toggle a layer's visibility.
    #[wasm_bindgen(js_name = setLayerVisibility)]
    pub fn set_layer_visibility(&mut self, layer: &str, visible: bool) -> bool {
        CanvasHost::set_layer_visibility(&mut self.session, layer, visible)
    }

    /// Layer visibility as JSON.
    #[wasm_bindgen(js_name = getVisibility)]
    #[must_use]
    pub fn get_visibility(&self) -> String {
        self.session.layer_visibility_json()
    }

    /// Presets available to the active tier, as JSON.
    #[wasm_bindgen(js_name = getAvailableBackgrounds)]
    #[must_use]
    pub fn get_available_backgrounds(&self) -> String {
        self.session.available_backgrounds_json()
    }
}
