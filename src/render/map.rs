//! The map: an ordered layer group shared across canvases, and the canvas
//! that composites rendered layers into one image.

use crate::error::{KartaError, Result};
use crate::render::canvas::Canvas;
use crate::render::layer::Layer;
use crate::types::{BBox, Color};
use std::cell::RefCell;
use std::rc::Rc;
use tiny_skia::Pixmap;

/// An ordered, mutable list of layers. Bottom of the draw order is
/// position 0.
///
/// Groups are shared by reference across canvases; reordering or toggling
/// a layer here is visible to every attached canvas on its next render.
#[derive(Default)]
pub struct LayerGroup {
    layers: Vec<Layer>,
}

impl LayerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into the shared handle canvases attach to.
    pub fn into_shared(self) -> Rc<RefCell<LayerGroup>> {
        Rc::new(RefCell::new(self))
    }

    /// Append on top; returns the new layer's position.
    pub fn add(&mut self, layer: impl Into<Layer>) -> usize {
        self.layers.push(layer.into());
        self.layers.len() - 1
    }

    /// # Errors
    ///
    /// `InvalidInput` for a position past the end.
    pub fn remove(&mut self, position: usize) -> Result<Layer> {
        if position >= self.layers.len() {
            return Err(KartaError::InvalidInput(format!(
                "no layer at position {position}"
            )));
        }
        Ok(self.layers.remove(position))
    }

    /// Move a layer to a new position, shifting the layers between.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when either position is past the end.
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.layers.len() || to >= self.layers.len() {
            return Err(KartaError::InvalidInput(format!(
                "cannot move layer {from} to {to} in a group of {}",
                self.layers.len()
            )));
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Layer> {
        self.layers.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Layer> {
        self.layers.get_mut(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }
}

/// A viewport over a shared layer group, compositing layer images
/// bottom-to-top into one output image.
pub struct MapCanvas {
    canvas: Canvas,
    layers: Rc<RefCell<LayerGroup>>,
    background: Option<Color>,
}

impl MapCanvas {
    /// # Errors
    ///
    /// `InvalidInput` for bad dimensions or a degenerate window.
    pub fn new(
        width: u32,
        height: u32,
        bbox: BBox,
        layers: Rc<RefCell<LayerGroup>>,
        background: Option<Color>,
    ) -> Result<Self> {
        Ok(Self {
            canvas: Canvas::new(width, height, bbox)?,
            layers,
            background,
        })
    }

    pub fn layers(&self) -> &Rc<RefCell<LayerGroup>> {
        &self.layers
    }

    pub fn bbox(&self) -> BBox {
        self.canvas.bbox()
    }

    /// The composited output image.
    pub fn image(&self) -> &Pixmap {
        self.canvas.pixmap()
    }

    /// Render every visible layer for the current viewport, then composite.
    pub fn render_all(&mut self) -> Result<()> {
        let (width, height, bbox) = (self.canvas.width(), self.canvas.height(), self.canvas.bbox());
        {
            let mut group = self.layers.borrow_mut();
            log::debug!("rendering {} layers at {width}x{height}", group.len());
            for layer in group.iter_mut() {
                layer.render(width, height, &bbox)?;
            }
        }
        self.composite();
        Ok(())
    }

    /// Re-render one layer, then composite from cached images.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a position past the end.
    pub fn render_one(&mut self, position: usize) -> Result<()> {
        let (width, height, bbox) = (self.canvas.width(), self.canvas.height(), self.canvas.bbox());
        {
            let mut group = self.layers.borrow_mut();
            let layer = group.get_mut(position).ok_or_else(|| {
                KartaError::InvalidInput(format!("no layer at position {position}"))
            })?;
            layer.render(width, height, &bbox)?;
        }
        self.composite();
        Ok(())
    }

    /// Paste the cached layer images bottom-to-top in current group order.
    ///
    /// Compositing is a pure function of group order at call time: layers
    /// reordered after rendering composite in the new order without being
    /// re-rendered.
    fn composite(&mut self) {
        self.canvas.clear(self.background.unwrap_or(Color::TRANSPARENT));
        let group = self.layers.borrow();
        for layer in group.iter() {
            if layer.visible() {
                if let Some(image) = layer.image() {
                    self.canvas.paste(image);
                }
            }
        }
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.canvas.pan(dx, dy);
    }

    pub fn zoom_bbox(&mut self, bbox: BBox) -> Result<()> {
        self.canvas.zoom_bbox(bbox)
    }

    pub fn zoom_factor(&mut self, factor: f64) -> Result<()> {
        self.canvas.zoom_factor(factor)
    }

    pub fn zoom_units(&mut self, units: f64) -> Result<()> {
        self.canvas.zoom_units(units)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas.resize(width, height)
    }
}
