//! Vector dataset: an ordered feature sequence with a shared field schema
//! and a lazily built spatial index.

use crate::error::{KartaError, Result};
use crate::feature::Feature;
use crate::index::SpatialIndex;
use crate::types::{BBox, FeatureId, GeometryKind, Value};
use geo::Geometry;
use std::cell::RefCell;

/// An ordered sequence of [`Feature`]s sharing one field schema.
///
/// The spatial index is built on the first `overlapping`/`disjoint` query
/// and memoized. Every mutation of features or geometries invalidates it
/// explicitly; a stale index is never served.
#[derive(Debug, Default)]
pub struct FeatureCollection {
    fields: Vec<String>,
    features: Vec<Feature>,
    geometry_type: Option<GeometryKind>,
    index: RefCell<Option<SpatialIndex>>,
    next_id: u64,
}

impl FeatureCollection {
    /// Create an empty collection with the given field schema.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` when field names repeat.
    pub fn new<S: Into<String>>(fields: Vec<S>) -> Result<Self> {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        for (i, name) in fields.iter().enumerate() {
            if fields[..i].contains(name) {
                return Err(KartaError::SchemaMismatch(format!(
                    "duplicate field name '{name}'"
                )));
            }
        }
        Ok(Self {
            fields,
            ..Default::default()
        })
    }

    /// Like [`new`](Self::new) but with a declared geometry kind tag.
    pub fn with_kind<S: Into<String>>(fields: Vec<S>, kind: GeometryKind) -> Result<Self> {
        let mut out = Self::new(fields)?;
        out.geometry_type = Some(kind);
        Ok(out)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, slot: usize) -> Option<&Feature> {
        self.features.get(slot)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Declared geometry kind, if one was set or derived.
    pub fn geometry_type(&self) -> Option<GeometryKind> {
        self.geometry_type
    }

    pub fn set_geometry_type(&mut self, kind: Option<GeometryKind>) {
        self.geometry_type = kind;
    }

    /// Value of `field` for `feature`, resolved through the schema.
    pub fn value<'a>(&self, feature: &'a Feature, field: &str) -> Option<&'a Value> {
        self.field_index(field).and_then(|i| feature.value(i))
    }

    /// Append a feature, assigning it a fresh identity.
    ///
    /// Invalidates the spatial index. The geometry kind tag is derived from
    /// the first geometry seen and cleared when later features disagree.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` when the row length differs from the field count.
    pub fn add_feature(&mut self, row: Vec<Value>, geometry: Option<Geometry>) -> Result<FeatureId> {
        if row.len() != self.fields.len() {
            return Err(KartaError::SchemaMismatch(format!(
                "row has {} values, schema has {} fields",
                row.len(),
                self.fields.len()
            )));
        }

        Ok(self.push(row, geometry))
    }

    /// Append without re-validating arity; transform outputs construct rows
    /// against their own schema and skip the check.
    pub(crate) fn push(&mut self, row: Vec<Value>, geometry: Option<Geometry>) -> FeatureId {
        let kind = geometry.as_ref().and_then(GeometryKind::of);
        if self.features.is_empty() {
            if self.geometry_type.is_none() {
                self.geometry_type = kind;
            }
        } else if kind.is_some() && self.geometry_type != kind {
            self.geometry_type = None;
        }

        let id = FeatureId(self.next_id);
        self.next_id += 1;
        self.features.push(Feature::new(id, row, geometry));
        self.invalidate_index();
        id
    }

    /// Mutable access to the feature at `slot`.
    ///
    /// Conservatively invalidates the spatial index: the caller may
    /// replace the geometry through the returned reference.
    pub fn feature_mut(&mut self, slot: usize) -> Option<&mut Feature> {
        self.invalidate_index();
        self.features.get_mut(slot)
    }

    /// Remove and return the feature at `slot`, invalidating the index.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `slot` is past the end.
    pub fn remove_feature(&mut self, slot: usize) -> Result<Feature> {
        if slot >= self.features.len() {
            return Err(KartaError::InvalidInput(format!("no feature at slot {slot}")));
        }
        self.invalidate_index();
        Ok(self.features.remove(slot))
    }

    /// Replace the geometry of the feature at `slot`, invalidating the
    /// index and the feature's cached bounding box.
    pub fn set_geometry_at(&mut self, slot: usize, geometry: Option<Geometry>) -> Result<()> {
        let feat = self
            .features
            .get_mut(slot)
            .ok_or_else(|| KartaError::InvalidInput(format!("no feature at slot {slot}")))?;
        feat.set_geometry(geometry);
        self.invalidate_index();
        Ok(())
    }

    /// Aggregate bounding box over all features, `None` when no feature has
    /// a geometry.
    pub fn bbox(&self) -> Option<BBox> {
        self.features
            .iter()
            .filter_map(|f| f.bbox())
            .reduce(|acc, b| acc.merged(&b))
    }

    /// Drop the memoized spatial index. The next query rebuilds it.
    pub fn invalidate_index(&mut self) {
        *self.index.get_mut() = None;
    }

    /// Whether an index is currently built.
    pub fn has_index(&self) -> bool {
        self.index.borrow().is_some()
    }

    /// Run `f` against the built index without rebuilding it.
    ///
    /// # Errors
    ///
    /// `IndexNotBuilt` when no index exists; the query methods below
    /// auto-build instead and never return this.
    pub fn with_index<T>(&self, f: impl FnOnce(&SpatialIndex) -> T) -> Result<T> {
        match self.index.borrow().as_ref() {
            Some(index) => Ok(f(index)),
            None => Err(KartaError::IndexNotBuilt),
        }
    }

    fn ensure_index(&self) {
        let mut slot = self.index.borrow_mut();
        if slot.is_none() {
            *slot = Some(SpatialIndex::build(&self.features));
        }
    }

    /// Features whose bounding box intersects `bbox`.
    ///
    /// A superset of the exactly-intersecting features: callers follow up
    /// with exact geometry tests when precision matters. Builds the index
    /// on first use.
    pub fn overlapping(&self, bbox: &BBox) -> Vec<&Feature> {
        self.ensure_index();
        let slots = self
            .index
            .borrow()
            .as_ref()
            .map(|ix| ix.overlapping(bbox))
            .unwrap_or_default();
        slots.into_iter().map(|s| &self.features[s]).collect()
    }

    /// Features whose bounding box provably does not intersect `bbox`.
    ///
    /// The complement of [`overlapping`](Self::overlapping) minus
    /// geometry-less features; exactly-disjoint features whose boxes touch
    /// `bbox` are not returned.
    pub fn disjoint(&self, bbox: &BBox) -> Vec<&Feature> {
        self.ensure_index();
        let slots = self
            .index
            .borrow()
            .as_ref()
            .map(|ix| ix.disjoint(bbox))
            .unwrap_or_default();
        slots.into_iter().map(|s| &self.features[s]).collect()
    }

    /// Deep copy: same schema and geometry kind, fresh feature identities.
    pub fn copy(&self) -> Self {
        let mut out = Self {
            fields: self.fields.clone(),
            geometry_type: self.geometry_type,
            ..Default::default()
        };
        for feat in &self.features {
            let id = FeatureId(out.next_id);
            out.next_id += 1;
            out.features
                .push(Feature::new(id, feat.row().to_vec(), feat.geometry().cloned()));
        }
        out
    }

    /// Empty collection sharing this one's schema and geometry kind, the
    /// starting point of every transform output.
    pub(crate) fn like(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            geometry_type: self.geometry_type,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point, line_string};

    fn points() -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["name"]).unwrap();
        for (name, x, y) in [("a", 0.0, 0.0), ("b", 5.0, 5.0), ("c", 9.0, 1.0)] {
            data.add_feature(
                vec![Value::from(name)],
                Some(Geometry::Point(Point::new(x, y))),
            )
            .unwrap();
        }
        data
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        assert!(matches!(
            FeatureCollection::new(vec!["a", "a"]),
            Err(KartaError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_row_arity_enforced() {
        let mut data = FeatureCollection::new(vec!["a", "b"]).unwrap();
        let err = data.add_feature(vec![Value::from(1)], None);
        assert!(matches!(err, Err(KartaError::SchemaMismatch(_))));
    }

    #[test]
    fn test_ids_are_unique_and_stable() {
        let data = points();
        let ids: Vec<_> = data.features().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![FeatureId(0), FeatureId(1), FeatureId(2)]);
    }

    #[test]
    fn test_index_lazy_build_and_invalidation() {
        let mut data = points();
        assert!(data.with_index(|_| ()).is_err());

        let hits = data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(hits.len(), 1);
        assert!(data.has_index());

        data.add_feature(
            vec![Value::from("d")],
            Some(Geometry::Point(Point::new(0.5, 0.5))),
        )
        .unwrap();
        assert!(!data.has_index());

        let hits = data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_set_geometry_invalidates() {
        let mut data = points();
        data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0));
        assert!(data.has_index());
        data.set_geometry_at(0, Some(Geometry::Point(Point::new(100.0, 100.0))))
            .unwrap();
        assert!(!data.has_index());
        assert!(data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_remove_feature_invalidates() {
        let mut data = points();
        data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0));
        assert!(data.has_index());

        let removed = data.remove_feature(0).unwrap();
        assert_eq!(removed.id(), FeatureId(0));
        assert!(!data.has_index());
        assert!(data.overlapping(&BBox::new(-1.0, -1.0, 1.0, 1.0)).is_empty());

        assert!(data.remove_feature(10).is_err());
    }

    #[test]
    fn test_aggregate_bbox() {
        let data = points();
        let bbox = data.bbox().unwrap();
        assert_eq!(bbox.min_x(), 0.0);
        assert_eq!(bbox.max_x(), 9.0);
        assert_eq!(bbox.max_y(), 5.0);
    }

    #[test]
    fn test_geometry_type_derived_and_cleared() {
        let mut data = FeatureCollection::new(vec!["v"]).unwrap();
        data.add_feature(
            vec![Value::Null],
            Some(Geometry::Point(Point::new(0.0, 0.0))),
        )
        .unwrap();
        assert_eq!(data.geometry_type(), Some(GeometryKind::Point));

        data.add_feature(
            vec![Value::Null],
            Some(Geometry::LineString(line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0)
            ])),
        )
        .unwrap();
        assert_eq!(data.geometry_type(), None);
    }

    #[test]
    fn test_copy_assigns_fresh_identities() {
        let data = points();
        let copied = data.copy();
        assert_eq!(copied.len(), data.len());
        assert_eq!(copied.fields(), data.fields());
        // identities restart in the copy
        assert_eq!(copied.features()[0].id(), FeatureId(0));
    }
}
