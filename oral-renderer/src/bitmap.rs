//! Image decoding.
//!
//! Supports raster images (PNG, JPEG, WebP), SVG documents, and inline
//! `data:` URIs in base64 or percent encoding. Everything decodes to a
//! premultiplied [`Bitmap`] ready to draw onto a layer surface.

use base64::Engine;
use tiny_skia::{ColorU8, Pixmap};

use crate::error::{RenderError, RenderResult};

/// A decoded image.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixmap: Pixmap,
    format: ImageFormat,
}

impl Bitmap {
    /// Wrap an already premultiplied pixmap.
    #[must_use]
    pub fn from_pixmap(pixmap: Pixmap, format: ImageFormat) -> Self {
        Self { pixmap, format }
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

    /// Decoded size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.pixmap.data().len()
    }

    /// Source format.
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Premultiplied pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// SVG document, rasterized at its intrinsic size.
    Svg,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/svg+xml" => Self::Svg,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        // SVG: XML prolog or a bare <svg> root, after optional BOM/whitespace
        let text = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        let start = text
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(text.len());
        let head = &text[start..];
        if head.starts_with(b"<svg") || head.starts_with(b"<?xml") {
            return Self::Svg;
        }

        Self::Unknown
    }
}

/// Parsing options with the shared font database.
pub(crate) fn svg_options() -> usvg::Options<'static> {
    let mut options = usvg::Options::default();
    options.fontdb = crate::fonts::font_database();
    options
}

/// Decode an image from raw bytes.
///
/// # Errors
///
/// Returns [`RenderError::ResourceLoad`] if the image cannot be decoded.
pub fn decode_bitmap(data: &[u8]) -> RenderResult<Bitmap> {
    let format = ImageFormat::from_magic_bytes(data);
    if format == ImageFormat::Svg {
        return rasterize_svg(data);
    }

    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::ResourceLoad(format!("Failed to decode image: {e}")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| RenderError::ResourceLoad(format!("Image has no pixels ({width}x{height})")))?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    Ok(Bitmap { pixmap, format })
}

/// Rasterize an SVG document at its intrinsic size.
///
/// # Errors
///
/// Returns [`RenderError::ResourceLoad`] if the document cannot be parsed.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rasterize_svg(data: &[u8]) -> RenderResult<Bitmap> {
    let tree = usvg::Tree::from_data(data, &svg_options())
        .map_err(|e| RenderError::ResourceLoad(format!("SVG parsing failed: {e}")))?;

    let px_w = tree.size().width().ceil() as u32;
    let px_h = tree.size().height().ceil() as u32;

    let mut pixmap = Pixmap::new(px_w.max(1), px_h.max(1))
        .ok_or_else(|| RenderError::ResourceLoad("Failed to create pixmap".to_string()))?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    Ok(Bitmap {
        pixmap,
        format: ImageFormat::Svg,
    })
}

/// Split a data URI into its MIME type and decoded payload.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns [`RenderError::ResourceLoad`] if the URI is malformed.
pub fn parse_data_uri(uri: &str) -> RenderResult<(String, Vec<u8>)> {
    let uri_data = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::ResourceLoad("Not a data URI".to_string()))?;

    // Find the comma separating metadata from data
    let comma_pos = uri_data
        .find(',')
        .ok_or_else(|| RenderError::ResourceLoad("Invalid data URI: missing comma".to_string()))?;

    let metadata = &uri_data[..comma_pos];
    let encoded_data = &uri_data[comma_pos + 1..];

    let mut parts = metadata.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_string();
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        // Hosts sometimes hand over base64 with line breaks
        let compact: String = encoded_data.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| RenderError::ResourceLoad(format!("Failed to decode base64: {e}")))?
    } else {
        percent_decode(encoded_data)?
    };

    Ok((mime, bytes))
}

/// Decode an image from a data URI.
///
/// # Errors
///
/// Returns [`RenderError::ResourceLoad`] if the data URI is malformed or the
/// image cannot be decoded.
pub fn load_image_from_data_uri(uri: &str) -> RenderResult<Bitmap> {
    let (mime, bytes) = parse_data_uri(uri)?;
    if ImageFormat::from_mime(&mime) == ImageFormat::Svg {
        return rasterize_svg(&bytes);
    }
    decode_bitmap(&bytes)
}

/// Percent-decoding over bytes, so multi-byte UTF-8 passes through intact.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::ResourceLoad("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}
