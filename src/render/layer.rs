//! Layers: a dataset bound to style and visibility, rendering itself into
//! a cached image for the compositor.

use crate::collection::FeatureCollection;
use crate::error::{KartaError, Result};
use crate::feature::Feature;
use crate::raster::RasterGrid;
use crate::render::canvas::{Canvas, ResolvedStyle};
use crate::style::{SortOrder, StyleOptions, StyleProp};
use crate::types::{BBox, Color, Value};
use std::str::FromStr;
use tiny_skia::Pixmap;

fn fallback<T: Clone>(prop: &StyleProp<T>, data: &FeatureCollection, feat: &Feature, default: T) -> T {
    prop.resolve(data, feat).unwrap_or(default)
}

/// A feature collection with its style configuration.
pub struct VectorLayer {
    data: FeatureCollection,
    style: StyleOptions,
    visible: bool,
    image: Option<Pixmap>,
}

impl VectorLayer {
    pub fn new(data: FeatureCollection) -> Self {
        Self::with_style(data, StyleOptions::default())
    }

    pub fn with_style(data: FeatureCollection, style: StyleOptions) -> Self {
        Self {
            data,
            style,
            visible: true,
            image: None,
        }
    }

    pub fn data(&self) -> &FeatureCollection {
        &self.data
    }

    /// Mutable dataset access. Style classifier memos go stale on
    /// mutation; this drops them all.
    pub fn data_mut(&mut self) -> &mut FeatureCollection {
        self.style.invalidate();
        &mut self.data
    }

    pub fn style(&self) -> &StyleOptions {
        &self.style
    }

    fn sorted_features<'a>(&self, features: Vec<&'a Feature>) -> Vec<&'a Feature> {
        let Some(field) = &self.style.sort_field else {
            return features;
        };
        static NULL: Value = Value::Null;
        let mut features = features;
        // missing keys order as null and draw first
        let key = |f: &'a Feature| self.data.value(f, field).unwrap_or(&NULL);
        features.sort_by(|a, b| key(a).total_cmp(key(b)));
        if self.style.sort_order == SortOrder::Descending {
            features.reverse();
        }
        features
    }

    fn render(&mut self, width: u32, height: u32, bbox: &BBox) -> Result<()> {
        let mut canvas = Canvas::new(width, height, *bbox)?;
        let features = self.sorted_features(self.data.overlapping(bbox));
        log::debug!("rendering vector layer: {} features in view", features.len());

        let defaults = StyleOptions::default();
        let default_fill = match defaults.fill_color {
            StyleProp::Constant(c) => c,
            StyleProp::Classified(_) => Color::BLACK,
        };
        for feat in features {
            let Some(geom) = feat.geometry() else { continue };
            let resolved = ResolvedStyle {
                fill_color: fallback(&self.style.fill_color, &self.data, feat, default_fill),
                fill_size: fallback(&self.style.fill_size, &self.data, feat, 4.0),
                outline_color: fallback(&self.style.outline_color, &self.data, feat, Color::BLACK),
                outline_width: fallback(&self.style.outline_width, &self.data, feat, 1.0),
            };
            canvas.draw_geometry(geom, &resolved);
        }
        self.image = Some(canvas.into_pixmap());
        Ok(())
    }
}

/// Colorization of a raster's cell values into pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorizeMode {
    /// Single-band linear stretch to gray.
    Grayscale,
    /// Single-band linear stretch remapped through a gradient.
    Colorscale,
    /// Three bands merged as 0-255 red, green, blue channels.
    Rgb,
}

impl FromStr for ColorizeMode {
    type Err = KartaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grayscale" => Ok(ColorizeMode::Grayscale),
            "colorscale" => Ok(ColorizeMode::Colorscale),
            "rgb" => Ok(ColorizeMode::Rgb),
            other => Err(KartaError::UnknownMode(other.to_string())),
        }
    }
}

fn gradient_color(stops: &[Color], t: f64) -> Color {
    match stops {
        [] => Color::BLACK,
        [only] => *only,
        _ => {
            let span = (stops.len() - 1) as f64;
            let pos = t.clamp(0.0, 1.0) * span;
            let i = (pos.floor() as usize).min(stops.len() - 2);
            Color::lerp(stops[i], stops[i + 1], pos - i as f64)
        }
    }
}

/// A raster grid with a colorization mode.
pub struct RasterLayer {
    grid: RasterGrid,
    mode: ColorizeMode,
    /// Stops for `Colorscale`, low to high.
    gradient: Vec<Color>,
    visible: bool,
    image: Option<Pixmap>,
}

impl RasterLayer {
    pub fn new(grid: RasterGrid, mode: ColorizeMode) -> Self {
        Self {
            grid,
            mode,
            gradient: vec![Color::rgb(0, 0, 128), Color::rgb(255, 255, 0)],
            visible: true,
            image: None,
        }
    }

    pub fn with_gradient(mut self, gradient: Vec<Color>) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    fn render(&mut self, width: u32, height: u32, bbox: &BBox) -> Result<()> {
        if matches!(self.mode, ColorizeMode::Rgb) && self.grid.bands().len() < 3 {
            return Err(KartaError::InvalidInput(format!(
                "rgb colorization needs 3 bands, grid has {}",
                self.grid.bands().len()
            )));
        }
        let view = self.grid.resample(width as usize, height as usize, bbox)?;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            KartaError::InvalidInput(format!("bad raster view dimensions {width} x {height}"))
        })?;

        let (lo, hi) = view.bands()[0]
            .min_max(view.nodata())
            .unwrap_or((0.0, 1.0));
        let stretch = |v: f64| {
            if hi > lo { (v - lo) / (hi - lo) } else { 0.0 }
        };

        let pixels = pixmap.pixels_mut();
        for row in 0..height as usize {
            for col in 0..width as usize {
                let i = row * width as usize + col;
                let color = match self.mode {
                    ColorizeMode::Grayscale | ColorizeMode::Colorscale => {
                        match view.value(0, col, row) {
                            Some(v) if !view.is_nodata(v) => {
                                let t = stretch(v);
                                if self.mode == ColorizeMode::Grayscale {
                                    let g = (t * 255.0).round() as u8;
                                    Color::rgb(g, g, g)
                                } else {
                                    gradient_color(&self.gradient, t)
                                }
                            }
                            _ => Color::TRANSPARENT,
                        }
                    }
                    ColorizeMode::Rgb => {
                        let channels = [
                            view.value(0, col, row),
                            view.value(1, col, row),
                            view.value(2, col, row),
                        ];
                        if channels
                            .iter()
                            .all(|c| c.is_some_and(|v| !view.is_nodata(v)))
                        {
                            let ch = |c: Option<f64>| {
                                c.map(|v| v.clamp(0.0, 255.0) as u8).unwrap_or(0)
                            };
                            Color::rgb(ch(channels[0]), ch(channels[1]), ch(channels[2]))
                        } else {
                            Color::TRANSPARENT
                        }
                    }
                };
                pixels[i] = tiny_skia::ColorU8::from_rgba(color.r, color.g, color.b, color.a)
                    .premultiply();
            }
        }
        self.image = Some(pixmap);
        Ok(())
    }
}

/// One entry of a layer group.
pub enum Layer {
    Vector(VectorLayer),
    Raster(RasterLayer),
}

impl Layer {
    pub fn visible(&self) -> bool {
        match self {
            Layer::Vector(l) => l.visible,
            Layer::Raster(l) => l.visible,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        match self {
            Layer::Vector(l) => l.visible = visible,
            Layer::Raster(l) => l.visible = visible,
        }
    }

    /// Last rendered image, if the layer has rendered at least once.
    pub fn image(&self) -> Option<&Pixmap> {
        match self {
            Layer::Vector(l) => l.image.as_ref(),
            Layer::Raster(l) => l.image.as_ref(),
        }
    }

    /// Render into the cached image. Invisible layers are a no-op and keep
    /// their previous image untouched.
    pub fn render(&mut self, width: u32, height: u32, bbox: &BBox) -> Result<()> {
        if !self.visible() {
            return Ok(());
        }
        match self {
            Layer::Vector(l) => l.render(width, height, bbox),
            Layer::Raster(l) => l.render(width, height, bbox),
        }
    }
}

impl From<VectorLayer> for Layer {
    fn from(l: VectorLayer) -> Self {
        Layer::Vector(l)
    }
}

impl From<RasterLayer> for Layer {
    fn from(l: RasterLayer) -> Self {
        Layer::Raster(l)
    }
}
