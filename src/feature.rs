//! A single vector feature: one attribute row plus an optional geometry.

use crate::types::{BBox, FeatureId, GeometryKind, Value};
use geo::Geometry;
use once_cell::sync::OnceCell;

/// One record of a [`FeatureCollection`](crate::FeatureCollection).
///
/// The bounding box is computed on first access and memoized; replacing the
/// geometry resets the cache. Identity lives in `id`, never in content: two
/// features with identical rows and geometries are still distinct entries
/// for every identity-keyed cache in the crate.
#[derive(Debug, Clone)]
pub struct Feature {
    id: FeatureId,
    row: Vec<Value>,
    geometry: Option<Geometry>,
    bbox: OnceCell<Option<BBox>>,
}

impl Feature {
    pub(crate) fn new(id: FeatureId, row: Vec<Value>, geometry: Option<Geometry>) -> Self {
        Self {
            id,
            row,
            geometry,
            bbox: OnceCell::new(),
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn row(&self) -> &[Value] {
        &self.row
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Kind tag of the geometry, if any.
    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().and_then(GeometryKind::of)
    }

    /// Bounding box of the geometry, memoized on first access. `None` when
    /// the feature has no geometry or the geometry is empty.
    pub fn bbox(&self) -> Option<BBox> {
        *self
            .bbox
            .get_or_init(|| self.geometry.as_ref().and_then(BBox::of_geometry))
    }

    /// Replace the geometry, resetting the cached bounding box.
    ///
    /// Owning collections must invalidate their spatial index after calling
    /// this; [`FeatureCollection::set_geometry_at`](crate::FeatureCollection::set_geometry_at)
    /// does so.
    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
        self.bbox = OnceCell::new();
    }

    /// Attribute value at a field position.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.row.get(index)
    }
}
