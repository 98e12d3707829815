//! Per-element paint rules.
//!
//! Each rule draws one element onto its layer surface in surface pixels.
//! Rules are deterministic: the same element on the same surface always
//! produces the same pixels.

use std::str::FromStr;

use oral_canvas_core::{DrawRect, FreehandStroke, PointKind, Stamp, TextLabel};
use tiny_skia::{
    Color, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, PixmapPaint, Stroke,
    Transform,
};

use crate::bitmap::{svg_options, Bitmap};
use crate::error::{RenderError, RenderResult};
use crate::fonts::LABEL_FAMILY;
use crate::surface::LayerSurface;

/// Parse a CSS color string. Unparsable input paints black.
#[must_use]
pub fn parse_color(css: &str) -> Color {
    match svgtypes::Color::from_str(css.trim()) {
        Ok(c) => Color::from_rgba8(c.red, c.green, c.blue, c.alpha),
        Err(e) => {
            tracing::warn!("Invalid color '{css}': {e}, using black");
            Color::BLACK
        }
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

/// Paint a freehand stroke as one continuous path.
///
/// The first point and every `moveTo` point start a sub-path. A stroke of a
/// single point is drawn as a dot of the stroke width.
pub fn paint_stroke(surface: &mut LayerSurface, stroke: &FreehandStroke) {
    let transform = Transform::identity();
    let paint = solid_paint(parse_color(&stroke.color));
    let line_width = stroke.line_width.max(0.1);

    if let [only] = stroke.path.as_slice() {
        if let Some(dot) = PathBuilder::from_circle(only.x, only.y, line_width / 2.0) {
            surface
                .pixmap_mut()
                .fill_path(&dot, &paint, FillRule::Winding, transform, None);
        }
        return;
    }

    let mut builder = PathBuilder::new();
    for (i, point) in stroke.path.iter().enumerate() {
        if i == 0 || point.kind == PointKind::MoveTo {
            builder.move_to(point.x, point.y);
        } else {
            builder.line_to(point.x, point.y);
        }
    }
    let Some(path) = builder.finish() else {
        tracing::trace!("Stroke {} has no drawable segments", stroke.id);
        return;
    };

    let style = Stroke {
        width: line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    surface
        .pixmap_mut()
        .stroke_path(&path, &paint, &style, transform, None);
}

/// Draw `bitmap` scaled into `rect`.
#[allow(clippy::cast_precision_loss)]
pub fn draw_bitmap(surface: &mut LayerSurface, bitmap: &Bitmap, rect: &DrawRect) {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }
    let sx = rect.width / bitmap.width() as f32;
    let sy = rect.height / bitmap.height() as f32;
    let transform = Transform::from_row(sx, 0.0, 0.0, sy, rect.x, rect.y);

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    surface
        .pixmap_mut()
        .draw_pixmap(0, 0, bitmap.pixmap().as_ref(), &paint, transform, None);
}

/// Paint a resolved stamp bitmap centered on the stamp position.
pub fn paint_stamp(surface: &mut LayerSurface, stamp: &Stamp, bitmap: &Bitmap) {
    let rect = DrawRect::centered(stamp.x, stamp.y, stamp.width, stamp.effective_height());
    if rect.width <= 0.0 {
        tracing::debug!("Stamp {} has no size, skipped", stamp.id);
        return;
    }
    draw_bitmap(surface, bitmap, &rect);
}

/// Paint a text label with its baseline start at `(x, y)`.
///
/// Text is set in the bundled [`LABEL_FAMILY`] face.
///
/// # Errors
///
/// Returns [`RenderError::Surface`] if the text cannot be laid out or
/// produced no glyphs.
pub fn paint_label(surface: &mut LayerSurface, label: &TextLabel) -> RenderResult<()> {
    if label.text.trim().is_empty() {
        return Ok(());
    }
    let color = parse_color(&label.color).to_color_u8();
    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">\
         <text x=\"{}\" y=\"{}\" font-size=\"{}\" font-family=\"'{LABEL_FAMILY}', sans-serif\" \
         fill=\"rgb({},{},{})\" fill-opacity=\"{}\" xml:space=\"preserve\">{}</text></svg>",
        surface.width(),
        surface.height(),
        label.x,
        label.y,
        label.size,
        color.red(),
        color.green(),
        color.blue(),
        f32::from(color.alpha()) / 255.0,
        escape_xml(&label.text),
    );

    let tree = usvg::Tree::from_str(&svg, &svg_options())
        .map_err(|e| RenderError::Surface(format!("label layout failed: {e}")))?;
    if !has_glyphs(tree.root()) {
        return Err(RenderError::Surface(format!(
            "label {} produced no glyphs",
            label.id
        )));
    }
    resvg::render(&tree, Transform::identity(), &mut surface.pixmap_mut().as_mut());
    Ok(())
}

fn has_glyphs(group: &usvg::Group) -> bool {
    group.children().iter().any(|node| match node {
        usvg::Node::Text(text) => text.flattened().has_children(),
        usvg::Node::Group(group) => has_glyphs(group),
        _ => false,
    })
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use oral_canvas_core::PathPoint;
    use tiny_skia::Pixmap;

    use super::*;
    use crate::bitmap::ImageFormat;
    use crate::surface::LayerName;

    fn surface() -> LayerSurface {
        LayerSurface::new(LayerName::Freehand, 100, 100).unwrap()
    }

    #[test]
    fn test_parse_color() {
        let red = parse_color("#ff0000").to_color_u8();
        assert_eq!((red.red(), red.green(), red.alpha()), (255, 0, 255));
        let named = parse_color("blue").to_color_u8();
        assert_eq!(named.blue(), 255);
        let rgba = parse_color("rgba(0, 0, 0, 0.5)").to_color_u8();
        assert!(rgba.alpha() > 120 && rgba.alpha() < 135);
        assert_eq!(parse_color("not-a-color"), Color::BLACK);
    }

    #[test]
    fn test_stroke_paints_along_path() {
        let mut s = surface();
        let stroke = FreehandStroke::new(
            vec![PathPoint::move_to(10.0, 50.0), PathPoint::line_to(90.0, 50.0)],
            "#000000",
            4.0,
        );
        paint_stroke(&mut s, &stroke);
        assert!(s.pixmap().pixel(50, 50).unwrap().alpha() > 0);
        assert_eq!(s.pixmap().pixel(50, 10).unwrap().alpha(), 0);
    }

    #[test]
    fn test_move_to_breaks_the_path() {
        let mut s = surface();
        let stroke = FreehandStroke::new(
            vec![
                PathPoint::move_to(10.0, 10.0),
                PathPoint::line_to(30.0, 10.0),
                PathPoint::move_to(70.0, 10.0),
                PathPoint::line_to(90.0, 10.0),
            ],
            "#000000",
            2.0,
        );
        paint_stroke(&mut s, &stroke);
        assert!(s.pixmap().pixel(20, 10).unwrap().alpha() > 0);
        assert_eq!(s.pixmap().pixel(50, 10).unwrap().alpha(), 0);
        assert!(s.pixmap().pixel(80, 10).unwrap().alpha() > 0);
    }

    #[test]
    fn test_single_point_stroke_is_a_dot() {
        let mut s = surface();
        let stroke = FreehandStroke::new(vec![PathPoint::move_to(40.0, 40.0)], "#000000", 6.0);
        paint_stroke(&mut s, &stroke);
        assert!(s.pixmap().pixel(40, 40).unwrap().alpha() > 0);
    }

    #[test]
    fn test_stamp_is_centered() {
        let mut s = surface();
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(Color::BLACK);
        let bitmap = Bitmap::from_pixmap(pixmap, ImageFormat::Png);
        let stamp = Stamp::new("x.png", 50.0, 50.0, 20.0, 0.0);
        paint_stamp(&mut s, &stamp, &bitmap);

        assert_eq!(s.pixmap().pixel(50, 50).unwrap().alpha(), 255);
        assert_eq!(s.pixmap().pixel(42, 42).unwrap().alpha(), 255);
        assert_eq!(s.pixmap().pixel(35, 50).unwrap().alpha(), 0);
        assert_eq!(s.pixmap().pixel(50, 65).unwrap().alpha(), 0);
    }

    #[test]
    fn test_zero_size_stamp_draws_nothing() {
        let mut s = surface();
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        pixmap.fill(Color::BLACK);
        let bitmap = Bitmap::from_pixmap(pixmap, ImageFormat::Png);
        paint_stamp(&mut s, &Stamp::new("x.png", 50.0, 50.0, 0.0, 0.0), &bitmap);
        assert!(s.is_blank());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
    }

    #[test]
    fn test_label_puts_glyphs_on_surface() {
        let mut s = LayerSurface::new(LayerName::Text, 200, 60).unwrap();
        let label = TextLabel::new("Caries 36", 10.0, 40.0, "#000000", 24.0);
        paint_label(&mut s, &label).unwrap();
        assert!(!s.is_blank());
        let inked = (0..200)
            .filter(|&x| s.pixmap().pixel(x, 32).is_some_and(|p| p.alpha() > 0))
            .count();
        assert!(inked > 10, "only {inked} inked pixels on the text row");
    }

    #[test]
    fn test_blank_label_paints_nothing() {
        let mut s = surface();
        let label = TextLabel::new("   ", 10.0, 50.0, "#000", 16.0);
        assert!(paint_label(&mut s, &label).is_ok());
        assert!(s.is_blank());
    }

    #[test]
    fn test_label_never_fails_on_markup() {
        let mut s = surface();
        let label = TextLabel::new("</text><script>", 10.0, 50.0, "#000", 16.0);
        assert!(paint_label(&mut s, &label).is_ok());
        assert!(!s.is_blank());
    }
}
