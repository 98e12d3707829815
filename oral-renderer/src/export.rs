//! Flattening and encoding of the visible layers.
//!
//! The exported image is the z-ordered composite of every visible exported
//! layer (background, freehand, stamp, text). The overlay never takes part.

use base64::Engine;
use image::ImageEncoder;
use oral_canvas_core::CanvasConfig;
use tiny_skia::{Pixmap, PixmapPaint, Transform};

pub use oral_canvas_core::ExportFormat;

use crate::error::{RenderError, RenderResult};
use crate::surface::{LayerName, LayerSurfaceSet};

/// Configuration for image export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Output encoding.
    pub format: ExportFormat,
    /// JPEG quality 1-100 (default: 85).
    pub jpeg_quality: u8,
    /// Matte color as RGBA bytes, used where JPEG cannot carry alpha.
    pub background: [u8; 4],
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            jpeg_quality: 85,
            background: [255, 255, 255, 255],
        }
    }
}

impl From<&CanvasConfig> for ExportConfig {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            format: config.export_format,
            jpeg_quality: config.jpeg_quality,
            ..Self::default()
        }
    }
}

/// Paint every visible exported layer, in z-order, onto one buffer.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if the buffer cannot be allocated.
pub fn flatten(surfaces: &LayerSurfaceSet) -> RenderResult<Pixmap> {
    let mut target = Pixmap::new(surfaces.width(), surfaces.height()).ok_or_else(|| {
        RenderError::Export(format!(
            "cannot allocate {}x{} export buffer",
            surfaces.width(),
            surfaces.height()
        ))
    })?;

    for name in LayerName::EXPORTED {
        let surface = surfaces.get(name);
        if !surface.is_visible() {
            tracing::trace!("Skipping hidden layer {name} in export");
            continue;
        }
        target.draw_pixmap(
            0,
            0,
            surface.pixmap().as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    Ok(target)
}

/// Encode a flattened buffer.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if encoding fails.
pub fn encode(pixmap: &Pixmap, config: &ExportConfig) -> RenderResult<Vec<u8>> {
    match config.format {
        ExportFormat::Png => pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}"))),
        ExportFormat::Jpeg => encode_jpeg(pixmap, config),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_jpeg(pixmap: &Pixmap, config: &ExportConfig) -> RenderResult<Vec<u8>> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let bg = &config.background;
    let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        let alpha = f32::from(color.alpha()) / 255.0;
        let inv = 1.0 - alpha;
        rgb_data.push(f32::from(color.red()).mul_add(alpha, f32::from(bg[0]) * inv).round() as u8);
        rgb_data.push(f32::from(color.green()).mul_add(alpha, f32::from(bg[1]) * inv).round() as u8);
        rgb_data.push(f32::from(color.blue()).mul_add(alpha, f32::from(bg[2]) * inv).round() as u8);
    }

    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, config.jpeg_quality);
    encoder
        .write_image(&rgb_data, width, height, image::ColorType::Rgb8.into())
        .map_err(|e| RenderError::Export(format!("JPEG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Flatten and encode in one step.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if allocation or encoding fails.
pub fn merge_visible(surfaces: &LayerSurfaceSet, config: &ExportConfig) -> RenderResult<Vec<u8>> {
    let pixmap = flatten(surfaces)?;
    let bytes = encode(&pixmap, config)?;
    tracing::debug!(
        "Exported {}x{} {:?} image, {} bytes",
        pixmap.width(),
        pixmap.height(),
        config.format,
        bytes.len()
    );
    Ok(bytes)
}

/// Wrap encoded bytes as a `data:` URL.
#[must_use]
pub fn to_data_url(bytes: &[u8], format: ExportFormat) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
