//! Embedded desktop-GIS core: vector features, spatial selection, styled
//! layer compositing.
//!
//! ```rust
//! use karta::{FeatureCollection, Value, ops};
//! use geo::{Geometry, Point};
//!
//! let mut cities = FeatureCollection::new(vec!["name"])?;
//! cities.add_feature(
//!     vec![Value::from("Oslo")],
//!     Some(Geometry::Point(Point::new(10.75, 59.91))),
//! )?;
//!
//! let window = karta::BBox::new(0.0, 55.0, 20.0, 65.0);
//! let cropped = ops::crop(&cities, &window);
//! assert_eq!(cropped.len(), 1);
//! # Ok::<(), karta::KartaError>(())
//! ```

pub mod collection;
pub mod engine;
pub mod error;
pub mod feature;
pub mod index;
pub mod ops;
pub mod raster;
pub mod render;
pub mod style;
pub mod types;

pub use collection::FeatureCollection;
pub use error::{KartaError, Result};
pub use feature::Feature;
pub use index::SpatialIndex;

pub use engine::{Projector, SpatialPredicate};

pub use geo::{Geometry, LineString, Point, Polygon};

pub use types::{BBox, Color, FeatureId, GeometryKind, Value};

pub use ops::{BufferDistance, BufferParams, GroupBreaks, PointMode, SplitKey, TileSpec};

pub use style::{ClassifyMode, Classifier, SortOrder, StyleOptions, StyleProp};

pub use raster::RasterGrid;

pub use render::{Canvas, ColorizeMode, Layer, LayerGroup, MapCanvas, RasterLayer, VectorLayer};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Feature, FeatureCollection, KartaError, Result};

    pub use geo::{Geometry, LineString, Point, Polygon};

    pub use crate::{BBox, Color, FeatureId, GeometryKind, Value};

    pub use crate::SpatialPredicate;

    pub use crate::ops::{self, BufferDistance, BufferParams, GroupBreaks, PointMode, SplitKey, TileSpec};

    pub use crate::{ClassifyMode, Classifier, SortOrder, StyleOptions, StyleProp};

    pub use crate::{ColorizeMode, Layer, LayerGroup, MapCanvas, RasterLayer, VectorLayer};
}
