//! Drawing surface: a pixmap bound to a coordinate-space bounding box.

use crate::error::{KartaError, Result};
use crate::types::{BBox, Color};
use geo::{Geometry, LineString, Point, Polygon};
use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Shader, Stroke, Transform,
};

/// Fully resolved per-feature drawing style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStyle {
    pub fill_color: Color,
    /// Point radius in pixels; line stroke width.
    pub fill_size: f64,
    pub outline_color: Color,
    pub outline_width: f64,
}

fn solid(color: Color) -> Paint<'static> {
    Paint {
        shader: Shader::SolidColor(color.to_skia()),
        anti_alias: true,
        ..Default::default()
    }
}

/// A pixel surface plus the coordinate-space window it depicts.
///
/// Coordinates map linearly into pixels with the y axis flipped, so north
/// is up. The viewport operations mutate only the window and dimensions;
/// nothing is redrawn until a caller renders again.
pub struct Canvas {
    pixmap: Pixmap,
    bbox: BBox,
}

impl Canvas {
    /// # Errors
    ///
    /// `InvalidInput` for zero pixel dimensions or a degenerate window.
    pub fn new(width: u32, height: u32, bbox: BBox) -> Result<Self> {
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(KartaError::InvalidInput(
                "canvas window must have positive extent".into(),
            ));
        }
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            KartaError::InvalidInput(format!("bad canvas dimensions {width} x {height}"))
        })?;
        Ok(Self { pixmap, bbox })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// Fill the whole surface with one color.
    pub fn clear(&mut self, background: Color) {
        self.pixmap.fill(background.to_skia());
    }

    /// Coordinate-space position to pixel position, y flipped.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let px = (x - self.bbox.min_x()) / self.bbox.width() * f64::from(self.width());
        let py = (self.bbox.max_y() - y) / self.bbox.height() * f64::from(self.height());
        (px as f32, py as f32)
    }

    fn line_path(&self, line: &LineString) -> Option<tiny_skia::Path> {
        let mut pb = PathBuilder::new();
        let mut coords = line.coords();
        let first = coords.next()?;
        let (x, y) = self.to_pixel(first.x, first.y);
        pb.move_to(x, y);
        for c in coords {
            let (x, y) = self.to_pixel(c.x, c.y);
            pb.line_to(x, y);
        }
        pb.finish()
    }

    fn polygon_path(&self, polygon: &Polygon) -> Option<tiny_skia::Path> {
        let mut pb = PathBuilder::new();
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            let mut coords = ring.coords();
            let Some(first) = coords.next() else { continue };
            let (x, y) = self.to_pixel(first.x, first.y);
            pb.move_to(x, y);
            for c in coords {
                let (x, y) = self.to_pixel(c.x, c.y);
                pb.line_to(x, y);
            }
            pb.close();
        }
        pb.finish()
    }

    fn draw_point(&mut self, point: &Point, style: &ResolvedStyle) {
        let (x, y) = self.to_pixel(point.x(), point.y());
        let Some(path) = PathBuilder::from_circle(x, y, style.fill_size as f32) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &solid(style.fill_color),
            FillRule::Winding,
            Transform::default(),
            None,
        );
        if style.outline_width > 0.0 {
            self.pixmap.stroke_path(
                &path,
                &solid(style.outline_color),
                &Stroke {
                    width: style.outline_width as f32,
                    ..Default::default()
                },
                Transform::default(),
                None,
            );
        }
    }

    fn draw_line(&mut self, line: &LineString, style: &ResolvedStyle) {
        let Some(path) = self.line_path(line) else { return };
        self.pixmap.stroke_path(
            &path,
            &solid(style.fill_color),
            &Stroke {
                width: style.fill_size.max(1.0) as f32,
                ..Default::default()
            },
            Transform::default(),
            None,
        );
    }

    fn draw_polygon(&mut self, polygon: &Polygon, style: &ResolvedStyle) {
        let Some(path) = self.polygon_path(polygon) else { return };
        // even-odd so interior rings come out as holes
        self.pixmap.fill_path(
            &path,
            &solid(style.fill_color),
            FillRule::EvenOdd,
            Transform::default(),
            None,
        );
        if style.outline_width > 0.0 {
            self.pixmap.stroke_path(
                &path,
                &solid(style.outline_color),
                &Stroke {
                    width: style.outline_width as f32,
                    ..Default::default()
                },
                Transform::default(),
                None,
            );
        }
    }

    /// Draw one geometry with a resolved style.
    pub fn draw_geometry(&mut self, geometry: &Geometry, style: &ResolvedStyle) {
        match geometry {
            Geometry::Point(p) => self.draw_point(p, style),
            Geometry::LineString(ls) => self.draw_line(ls, style),
            Geometry::Polygon(poly) => self.draw_polygon(poly, style),
            Geometry::MultiPoint(mp) => {
                for p in mp {
                    self.draw_point(p, style);
                }
            }
            Geometry::MultiLineString(mls) => {
                for ls in mls {
                    self.draw_line(ls, style);
                }
            }
            Geometry::MultiPolygon(mp) => {
                for poly in mp {
                    self.draw_polygon(poly, style);
                }
            }
            other => {
                for part in crate::engine::flatten_parts(other) {
                    self.draw_geometry(&part, style);
                }
            }
        }
    }

    /// Alpha-composite another pixmap over this surface at the origin.
    pub fn paste(&mut self, image: &Pixmap) {
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::default(),
            None,
        );
    }

    /// Shift the window by coordinate-unit offsets.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.bbox = BBox::new(
            self.bbox.min_x() + dx,
            self.bbox.min_y() + dy,
            self.bbox.max_x() + dx,
            self.bbox.max_y() + dy,
        );
    }

    /// Replace the window outright.
    pub fn zoom_bbox(&mut self, bbox: BBox) -> Result<()> {
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(KartaError::InvalidInput(
                "zoom window must have positive extent".into(),
            ));
        }
        self.bbox = bbox;
        Ok(())
    }

    /// Scale the window around its center; factors above one zoom in.
    pub fn zoom_factor(&mut self, factor: f64) -> Result<()> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(KartaError::InvalidInput(format!(
                "zoom factor must be positive and finite, got {factor}"
            )));
        }
        let (cx, cy) = self.bbox.center();
        let half_w = self.bbox.width() / factor / 2.0;
        let half_h = self.bbox.height() / factor / 2.0;
        self.bbox = BBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h);
        Ok(())
    }

    /// Set the window width in coordinate units, preserving center and
    /// aspect ratio.
    pub fn zoom_units(&mut self, units: f64) -> Result<()> {
        if units <= 0.0 || !units.is_finite() {
            return Err(KartaError::InvalidInput(format!(
                "zoom width must be positive and finite, got {units}"
            )));
        }
        self.zoom_factor(self.bbox.width() / units)
    }

    /// Swap in a blank surface of new dimensions; the window is kept and
    /// callers re-render when ready.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.pixmap = Pixmap::new(width, height).ok_or_else(|| {
            KartaError::InvalidInput(format!("bad canvas dimensions {width} x {height}"))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn style() -> ResolvedStyle {
        ResolvedStyle {
            fill_color: Color::rgb(255, 0, 0),
            fill_size: 4.0,
            outline_color: Color::BLACK,
            outline_width: 1.0,
        }
    }

    fn any_colored_pixel(pixmap: &Pixmap) -> bool {
        pixmap.pixels().iter().any(|p| p.alpha() > 0)
    }

    #[test]
    fn test_pixel_mapping_flips_y() {
        let canvas = Canvas::new(100, 100, BBox::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let (x, y) = canvas.to_pixel(0.0, 0.0);
        assert_eq!((x, y), (0.0, 100.0));
        let (x, y) = canvas.to_pixel(10.0, 10.0);
        assert_eq!((x, y), (100.0, 0.0));
        let (x, y) = canvas.to_pixel(5.0, 5.0);
        assert_eq!((x, y), (50.0, 50.0));
    }

    #[test]
    fn test_draw_marks_pixels() {
        let mut canvas = Canvas::new(50, 50, BBox::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert!(!any_colored_pixel(canvas.pixmap()));
        canvas.draw_geometry(
            &Geometry::Polygon(polygon![
                (x: 2.0, y: 2.0),
                (x: 8.0, y: 2.0),
                (x: 8.0, y: 8.0),
                (x: 2.0, y: 8.0),
            ]),
            &style(),
        );
        assert!(any_colored_pixel(canvas.pixmap()));
    }

    #[test]
    fn test_viewport_ops_mutate_window_only() {
        let mut canvas = Canvas::new(10, 10, BBox::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        canvas.draw_geometry(
            &Geometry::Point(Point::new(5.0, 5.0)),
            &style(),
        );
        let before: Vec<_> = canvas.pixmap().pixels().to_vec();

        canvas.pan(2.0, -1.0);
        assert_eq!(canvas.bbox(), BBox::new(2.0, -1.0, 12.0, 9.0));
        canvas.zoom_factor(2.0).unwrap();
        assert_eq!(canvas.bbox().width(), 5.0);
        assert_eq!(canvas.bbox().center(), (7.0, 4.0));
        canvas.zoom_units(20.0).unwrap();
        assert!((canvas.bbox().width() - 20.0).abs() < 1e-9);

        // pixels untouched by any viewport op
        assert_eq!(canvas.pixmap().pixels(), before);
    }

    #[test]
    fn test_zoom_bbox_rejects_degenerate() {
        let mut canvas = Canvas::new(10, 10, BBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert!(canvas.zoom_bbox(BBox::new(0.0, 0.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_paste_composites() {
        let mut base = Canvas::new(10, 10, BBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        let mut top = Canvas::new(10, 10, BBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        top.clear(Color::rgb(0, 255, 0));
        base.paste(top.pixmap());
        assert!(any_colored_pixel(base.pixmap()));
    }
}
