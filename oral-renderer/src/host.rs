//! String-typed host interface.
//!
//! Bridges (WASM, form-field glue, scripting) speak JSON strings and plain
//! flags. [`CanvasHost`] is that surface; adapters wrap a [`CanvasSession`]
//! rather than reaching into it.

use oral_canvas_core::{BackgroundOptions, ElementKind, LicenseTier};

use crate::session::CanvasSession;

/// Canvas operations as seen by a host bridge.
///
/// Failures come back as `None`/`false` and are logged; nothing panics.
pub trait CanvasHost {
    /// Add an element from JSON. Returns the new id.
    fn add_element(&mut self, type_name: &str, data_json: &str) -> Option<String>;

    /// Shallow-merge JSON into an element.
    fn update_element(&mut self, type_name: &str, id: &str, data_json: &str) -> bool;

    /// Remove an element.
    fn remove_element(&mut self, type_name: &str, id: &str) -> bool;

    /// Remove every element of a type.
    fn clear_elements(&mut self, type_name: &str) -> bool;

    /// Remove everything and restore the default background.
    fn clear_all(&mut self);

    /// Erase elements of a type under a hit circle given in host coordinates.
    /// Returns how many were removed.
    fn erase_at(&mut self, type_name: &str, x: f32, y: f32, radius: f32) -> usize;

    /// Resize the canvas.
    fn resize(&mut self, width: u32, height: u32);

    /// Rebuild the data layers from the store.
    fn redraw(&mut self);

    /// Apply finished image loads. Returns the paint report as JSON.
    fn pump(&mut self) -> String;

    /// Flattened visible layers as a `data:` URL.
    fn export_image_data_url(&self) -> Option<String>;

    /// Snapshot JSON.
    fn export_snapshot_json(&self) -> Option<String>;

    /// Replace everything from snapshot JSON.
    fn import_snapshot_json(&mut self, json: &str) -> bool;

    /// Request a background. `options_json` may be empty.
    ///
    /// # Errors
    ///
    /// Returns the error message if the request is rejected.
    fn set_background(&mut self, src: &str, options_json: &str) -> Result<(), String>;

    /// Set the license tier by name (`free` or `premium`).
    fn set_license_tier(&mut self, tier: &str) -> bool;

    /// Toggle a layer's visibility.
    fn set_layer_visibility(&mut self, layer: &str, visible: bool) -> bool;

    /// Visibility per layer as a JSON object.
    fn layer_visibility_json(&self) -> String;

    /// Presets the active tier may select, as a JSON array.
    fn available_backgrounds_json(&self) -> String;
}

fn parse_payload(what: &str, json: &str) -> Option<serde_json::Value> {
    serde_json::from_str(json)
        .map_err(|e| tracing::warn!("Unparsable {what} payload: {e}"))
        .ok()
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::warn!("Serialization failed: {e}");
        String::from("null")
    })
}

impl CanvasHost for CanvasSession {
    fn add_element(&mut self, type_name: &str, data_json: &str) -> Option<String> {
        let data = parse_payload("element", data_json)?;
        match CanvasSession::add_element(self, type_name, data) {
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                tracing::warn!("add_element({type_name}) failed: {e}");
                None
            }
        }
    }

    fn update_element(&mut self, type_name: &str, id: &str, data_json: &str) -> bool {
        parse_payload("update", data_json)
            .is_some_and(|data| CanvasSession::update_element(self, type_name, id, data))
    }

    fn remove_element(&mut self, type_name: &str, id: &str) -> bool {
        CanvasSession::remove_element(self, type_name, id)
    }

    fn clear_elements(&mut self, type_name: &str) -> bool {
        CanvasSession::clear_elements(self, type_name)
    }

    fn clear_all(&mut self) {
        CanvasSession::clear_all(self);
    }

    fn erase_at(&mut self, type_name: &str, x: f32, y: f32, radius: f32) -> usize {
        let Ok(kind) = type_name.parse::<ElementKind>() else {
            tracing::warn!("erase_at: unknown element type {type_name:?}");
            return 0;
        };
        let (cx, cy) = self.map_point(x, y);
        CanvasSession::erase_at(self, kind, cx, cy, radius).len()
    }

    fn resize(&mut self, width: u32, height: u32) {
        CanvasSession::resize(self, width, height);
    }

    fn redraw(&mut self) {
        CanvasSession::redraw(self);
    }

    fn pump(&mut self) -> String {
        to_json(&CanvasSession::pump(self))
    }

    fn export_image_data_url(&self) -> Option<String> {
        self.export_data_url()
            .map_err(|e| tracing::error!("Image export failed: {e}"))
            .ok()
    }

    fn export_snapshot_json(&self) -> Option<String> {
        self.export_json()
            .map_err(|e| tracing::error!("Snapshot export failed: {e}"))
            .ok()
    }

    fn import_snapshot_json(&mut self, json: &str) -> bool {
        match self.import_snapshot(json) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Snapshot import rejected: {e}");
                false
            }
        }
    }

    fn set_background(&mut self, src: &str, options_json: &str) -> Result<(), String> {
        let options = BackgroundOptions::from_json_lenient(options_json);
        CanvasSession::set_background(self, src, options)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn set_license_tier(&mut self, tier: &str) -> bool {
        match tier.parse::<LicenseTier>() {
            Ok(tier) => {
                CanvasSession::set_license_tier(self, tier);
                true
            }
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    fn set_layer_visibility(&mut self, layer: &str, visible: bool) -> bool {
        self.compositor_mut().set_layer_visibility(layer, visible)
    }

    fn layer_visibility_json(&self) -> String {
        to_json(&self.compositor().visibility())
    }

    fn available_backgrounds_json(&self) -> String {
        to_json(&self.compositor().available_backgrounds())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oral_canvas_core::CanvasConfig;

    use super::*;
    use crate::loader::MemoryLoader;

    fn host() -> CanvasSession {
        CanvasSession::with_loader(CanvasConfig::default(), Arc::new(MemoryLoader::new())).unwrap()
    }

    #[test]
    fn test_host_crud_round_trip() {
        let mut h = host();
        let id = CanvasHost::add_element(&mut h, "stamp", r#"{"src":"a.png","x":100,"y":100,"width":30}"#)
            .unwrap();
        assert!(CanvasHost::update_element(&mut h, "stamp", &id, r#"{"x":120}"#));
        assert!(!CanvasHost::update_element(&mut h, "stamp", &id, "not json"));
        assert!(CanvasHost::remove_element(&mut h, "stamp", &id));
        assert!(!CanvasHost::remove_element(&mut h, "stamp", &id));
        assert!(CanvasHost::add_element(&mut h, "bogus", "{}").is_none());
        assert!(!CanvasHost::clear_elements(&mut h, "bogus"));
    }

    #[test]
    fn test_license_gate_through_host() {
        let mut h = host();
        let custom = "data:image/svg+xml,%3Csvg%20xmlns='http://www.w3.org/2000/svg'%20width='4'%20height='4'/%3E";
        assert!(CanvasHost::set_background(&mut h, custom, "{}").is_err());
        assert!(CanvasHost::set_license_tier(&mut h, "premium"));
        assert!(CanvasHost::set_background(&mut h, custom, "").is_ok());
        assert!(!CanvasHost::set_license_tier(&mut h, "gold"));
    }

    #[test]
    fn test_visibility_and_presets_json() {
        let mut h = host();
        assert!(CanvasHost::set_layer_visibility(&mut h, "text", false));
        let vis: serde_json::Value = serde_json::from_str(&h.layer_visibility_json()).unwrap();
        assert_eq!(vis["text"], false);
        assert_eq!(vis["overlay"], true);

        let presets: serde_json::Value = serde_json::from_str(&h.available_backgrounds_json()).unwrap();
        assert_eq!(presets.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut h = host();
        CanvasHost::add_element(&mut h, "text", r#"{"text":"N","x":50,"y":50}"#).unwrap();
        let json = h.export_snapshot_json().unwrap();

        let mut other = host();
        assert!(other.import_snapshot_json(&json));
        assert_eq!(other.store().len(), 1);
        assert!(!other.import_snapshot_json("{{"));
        assert!(h.export_image_data_url().unwrap().starts_with("data:image/png;base64,"));
    }
}
