//! Fit math, hit testing, and boundary coordinate mapping.

use serde::{Deserialize, Serialize};

/// Average glyph advance used to estimate label width, in em.
pub const AVERAGE_GLYPH_ADVANCE: f32 = 0.6;

/// How a background image is scaled into the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMethod {
    /// Scale to fit entirely inside the canvas, letterboxed.
    #[default]
    Contain,
    /// Scale to cover the whole canvas, overflowing one axis.
    Cover,
    /// Fill the canvas exactly, ignoring aspect ratio.
    Stretch,
}

/// Fit policy attached to a background configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitPolicy {
    /// Keep the source aspect ratio. `false` behaves like [`FitMethod::Stretch`].
    #[serde(default = "FitPolicy::default_maintain")]
    pub maintain_aspect_ratio: bool,
    /// Scaling rule.
    #[serde(default)]
    pub fit_method: FitMethod,
}

impl FitPolicy {
    const fn default_maintain() -> bool {
        true
    }

    /// Policy with the given method, aspect ratio kept.
    #[must_use]
    pub const fn new(fit_method: FitMethod) -> Self {
        Self {
            maintain_aspect_ratio: true,
            fit_method,
        }
    }
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self::new(FitMethod::Contain)
    }
}

/// Destination rectangle for drawing an image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl DrawRect {
    /// Rectangle of the given size centered on `(cx, cy)`.
    #[must_use]
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Compute where an image of `image` size lands on a canvas of `canvas` size.
///
/// Degenerate image sizes fall back to filling the canvas.
#[must_use]
pub fn fit_rect(canvas: (f32, f32), image: (f32, f32), policy: FitPolicy) -> DrawRect {
    let (canvas_w, canvas_h) = canvas;
    let (img_w, img_h) = image;

    let fill = DrawRect {
        x: 0.0,
        y: 0.0,
        width: canvas_w,
        height: canvas_h,
    };

    if img_w <= 0.0 || img_h <= 0.0 {
        return fill;
    }
    if !policy.maintain_aspect_ratio {
        return fill;
    }

    let scale_x = canvas_w / img_w;
    let scale_y = canvas_h / img_h;
    let scale = match policy.fit_method {
        FitMethod::Contain => scale_x.min(scale_y),
        FitMethod::Cover => scale_x.max(scale_y),
        FitMethod::Stretch => return fill,
    };

    let width = img_w * scale;
    let height = img_h * scale;
    DrawRect {
        x: (canvas_w - width) / 2.0,
        y: (canvas_h - height) / 2.0,
        width,
        height,
    }
}

/// Whether any of `points` lies within `radius` of `(x, y)`.
#[must_use]
pub fn any_point_within<I>(points: I, x: f32, y: f32, radius: f32) -> bool
where
    I: IntoIterator<Item = (f32, f32)>,
{
    let r2 = radius * radius;
    points.into_iter().any(|(px, py)| {
        let dx = px - x;
        let dy = py - y;
        dx * dx + dy * dy <= r2
    })
}

/// Whether the circle at `(x, y)` with `radius` touches `rect`.
#[must_use]
pub fn circle_intersects_rect(x: f32, y: f32, radius: f32, rect: &DrawRect) -> bool {
    let closest_x = x.clamp(rect.x.min(rect.right()), rect.x.max(rect.right()));
    let closest_y = y.clamp(rect.y.min(rect.bottom()), rect.y.max(rect.bottom()));
    let dx = closest_x - x;
    let dy = closest_y - y;
    dx * dx + dy * dy <= radius * radius
}

/// Estimated bounding box of a baseline-anchored label.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn label_extent(text: &str, x: f32, y: f32, size: f32) -> DrawRect {
    let width = text.chars().count() as f32 * size * AVERAGE_GLYPH_ADVANCE;
    DrawRect {
        x,
        y: y - size,
        width,
        height: size,
    }
}

/// Maps host pointer coordinates into canvas pixel space.
///
/// The host environment owns any correction heuristics; the core only
/// ever sees mapped coordinates.
pub trait CoordinateMapper: Send + Sync {
    /// Map a host-space point to canvas space.
    fn to_canvas(&self, x: f32, y: f32) -> (f32, f32);
}

/// Passes coordinates through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl CoordinateMapper for IdentityMapper {
    fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (x, y)
    }
}

/// Maps client coordinates relative to a displayed rectangle into canvas
/// pixels, undoing CSS scaling and device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMapper {
    /// Displayed rectangle of the canvas in client space.
    pub display: DrawRect,
    /// Canvas pixel width.
    pub canvas_width: f32,
    /// Canvas pixel height.
    pub canvas_height: f32,
}

impl CoordinateMapper for ViewportMapper {
    fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        let scale_x = if self.display.width > 0.0 {
            self.canvas_width / self.display.width
        } else {
            1.0
        };
        let scale_y = if self.display.height > 0.0 {
            self.canvas_height / self.display.height
        } else {
            1.0
        };
        (
            (x - self.display.x) * scale_x,
            (y - self.display.y) * scale_y,
        )
    }
}
