//! Layer surfaces: one pixel buffer per layer, all sharing one size.

use std::collections::BTreeMap;
use std::str::FromStr;

use oral_canvas_core::ElementKind;
use serde::{Deserialize, Serialize};
use tiny_skia::{Color, Pixmap};

use crate::error::{RenderError, RenderResult};

/// The five layers, declared in z-order (bottom first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerName {
    /// Background diagram.
    #[serde(rename = "background")]
    Background,
    /// Freehand strokes.
    #[serde(rename = "freedraw")]
    Freehand,
    /// Stamps.
    #[serde(rename = "stamp")]
    Stamp,
    /// Text labels.
    #[serde(rename = "text")]
    Text,
    /// Transient interaction chrome; never exported.
    #[serde(rename = "overlay")]
    Overlay,
}

impl LayerName {
    /// All layers in z-order.
    pub const ALL: [Self; 5] = [
        Self::Background,
        Self::Freehand,
        Self::Stamp,
        Self::Text,
        Self::Overlay,
    ];

    /// Layers that are flattened into exported images, in z-order.
    pub const EXPORTED: [Self; 4] = [Self::Background, Self::Freehand, Self::Stamp, Self::Text];

    /// Wire name used by the host.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Freehand => "freedraw",
            Self::Stamp => "stamp",
            Self::Text => "text",
            Self::Overlay => "overlay",
        }
    }

    /// The layer that holds elements of `kind`.
    #[must_use]
    pub const fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Freehand => Self::Freehand,
            ElementKind::Stamp => Self::Stamp,
            ElementKind::Text => Self::Text,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for LayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerName {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "background" => Ok(Self::Background),
            "freedraw" | "freehand" => Ok(Self::Freehand),
            "stamp" => Ok(Self::Stamp),
            "text" => Ok(Self::Text),
            "overlay" => Ok(Self::Overlay),
            other => Err(RenderError::UnknownLayer(other.to_string())),
        }
    }
}

fn allocate(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| RenderError::Surface(format!("cannot allocate {width}x{height} surface")))
}

/// One layer's pixel buffer plus its visibility flag.
///
/// Content is disposable: it can always be regenerated from the element store.
/// The generation increases whenever the content is discarded, which lets
/// late asynchronous paints detect that their target has moved on.
#[derive(Debug, Clone)]
pub struct LayerSurface {
    name: LayerName,
    pixmap: Pixmap,
    visible: bool,
    generation: u64,
}

impl LayerSurface {
    /// Create a transparent, visible surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if either dimension is zero.
    pub fn new(name: LayerName, width: u32, height: u32) -> RenderResult<Self> {
        Ok(Self {
            name,
            pixmap: allocate(width, height)?,
            visible: true,
            generation: 0,
        })
    }

    /// Layer name.
    #[must_use]
    pub fn name(&self) -> LayerName {
        self.name
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Size as floats, for fit math.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_f32(&self) -> (f32, f32) {
        (self.width() as f32, self.height() as f32)
    }

    /// Whether the layer takes part in exports.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Toggle the visibility flag. Pixels are untouched.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Content generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Mutable pixels, for painting.
    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Discard all pixels.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
        self.generation += 1;
    }

    /// Flood the surface with `color`. Does not start a new generation.
    pub fn fill(&mut self, color: Color) {
        self.pixmap.fill(color);
    }

    /// Resize in place. Content is discarded, not scaled.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if either dimension is zero; the surface
    /// is left as it was.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.pixmap = allocate(width, height)?;
        self.generation += 1;
        Ok(())
    }

    /// Whether every pixel is fully transparent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixmap.data().iter().all(|&b| b == 0)
    }
}

/// The five layer surfaces, kept at one shared size.
#[derive(Debug, Clone)]
pub struct LayerSurfaceSet {
    surfaces: Vec<LayerSurface>,
    width: u32,
    height: u32,
}

impl LayerSurfaceSet {
    /// Create all five surfaces at the given size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let surfaces = LayerName::ALL
            .into_iter()
            .map(|name| LayerSurface::new(name, width, height))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(Self {
            surfaces,
            width,
            height,
        })
    }

    /// Shared width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Shared height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The surface for `name`.
    #[must_use]
    pub fn get(&self, name: LayerName) -> &LayerSurface {
        &self.surfaces[name.index()]
    }

    /// Mutable surface for `name`.
    pub fn get_mut(&mut self, name: LayerName) -> &mut LayerSurface {
        &mut self.surfaces[name.index()]
    }

    /// Surfaces in z-order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerSurface> {
        self.surfaces.iter()
    }

    /// Resize every surface, discarding all content.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Surface`] if either dimension is zero; no surface
    /// is changed in that case.
    pub fn resize_all(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::Surface(format!(
                "cannot resize surfaces to {width}x{height}"
            )));
        }
        for surface in &mut self.surfaces {
            surface.resize(width, height)?;
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Visibility flag per layer.
    #[must_use]
    pub fn visibility(&self) -> BTreeMap<LayerName, bool> {
        self.surfaces
            .iter()
            .map(|s| (s.name(), s.is_visible()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_order_and_names() {
        assert!(LayerName::Background < LayerName::Freehand);
        assert!(LayerName::Text < LayerName::Overlay);
        assert_eq!("freedraw".parse::<LayerName>().unwrap(), LayerName::Freehand);
        assert!(matches!(
            "foreground".parse::<LayerName>(),
            Err(RenderError::UnknownLayer(_))
        ));
        assert!(!LayerName::EXPORTED.contains(&LayerName::Overlay));
    }

    #[test]
    fn test_clear_and_resize_advance_generation() {
        let mut surface = LayerSurface::new(LayerName::Stamp, 10, 10).unwrap();
        assert_eq!(surface.generation(), 0);
        surface.fill(Color::WHITE);
        assert_eq!(surface.generation(), 0);
        assert!(!surface.is_blank());
        surface.clear();
        assert!(surface.is_blank());
        assert_eq!(surface.generation(), 1);
        surface.resize(20, 5).unwrap();
        assert_eq!((surface.width(), surface.height()), (20, 5));
        assert_eq!(surface.generation(), 2);
    }

    #[test]
    fn test_resize_discards_content() {
        let mut set = LayerSurfaceSet::new(8, 8).unwrap();
        set.get_mut(LayerName::Freehand).fill(Color::BLACK);
        set.resize_all(8, 8).unwrap();
        assert!(set.iter().all(LayerSurface::is_blank));
    }

    #[test]
    fn test_zero_resize_rejected_without_change() {
        let mut set = LayerSurfaceSet::new(8, 8).unwrap();
        assert!(set.resize_all(0, 4).is_err());
        assert_eq!((set.width(), set.height()), (8, 8));
        assert!(set.iter().all(|s| s.width() == 8));
    }

    #[test]
    fn test_visibility_map() {
        let mut set = LayerSurfaceSet::new(4, 4).unwrap();
        set.get_mut(LayerName::Text).set_visible(false);
        let map = set.visibility();
        assert_eq!(map.len(), 5);
        assert!(!map[&LayerName::Text]);
        assert!(map[&LayerName::Background]);
    }
}
