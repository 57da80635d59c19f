//! Rendering pipeline: drawing canvas, styled layers, and the compositing
//! map canvas.

pub mod canvas;
pub mod layer;
pub mod map;

pub use canvas::{Canvas, ResolvedStyle};
pub use layer::{ColorizeMode, Layer, RasterLayer, VectorLayer};
pub use map::{LayerGroup, MapCanvas};
