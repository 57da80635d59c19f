//! Bounding-box spatial index over a feature snapshot.
//!
//! Backed by an R-tree bulk-loaded from the features' bounding boxes.
//! Queries answer in box space only: `overlapping` over-approximates exact
//! geometric intersection and `disjoint` returns only provable misses, a
//! deliberate precision/performance trade-off. Callers confirm with exact
//! predicates when it matters.

use crate::feature::Feature;
use crate::types::{BBox, FeatureId};
use rstar::{AABB, RTree, RTreeObject};

/// One indexed entry: a feature's slot in its collection plus its box.
#[derive(Debug, Clone, PartialEq)]
struct IndexedBox {
    slot: usize,
    id: FeatureId,
    bbox: BBox,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x(), self.bbox.min_y()],
            [self.bbox.max_x(), self.bbox.max_y()],
        )
    }
}

/// Immutable index over one snapshot of a collection's features.
///
/// Geometry-less features are not indexed and never appear in results.
/// Result order is unspecified but stable for a given build.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedBox>,
    entries: Vec<IndexedBox>,
}

impl SpatialIndex {
    /// O(n) build from a full feature snapshot; boxes are computed once.
    pub fn build(features: &[Feature]) -> Self {
        let entries: Vec<IndexedBox> = features
            .iter()
            .enumerate()
            .filter_map(|(slot, feat)| {
                feat.bbox().map(|bbox| IndexedBox {
                    slot,
                    id: feat.id(),
                    bbox,
                })
            })
            .collect();
        log::debug!(
            "built spatial index over {} of {} features",
            entries.len(),
            features.len()
        );
        Self {
            tree: RTree::bulk_load(entries.clone()),
            entries,
        }
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slots of features whose box intersects `bbox`.
    pub fn overlapping(&self, bbox: &BBox) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [bbox.min_x(), bbox.min_y()],
            [bbox.max_x(), bbox.max_y()],
        );
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Slots of features whose box provably does not intersect `bbox`.
    ///
    /// Not the complement of exact-geometry disjointness: a feature whose
    /// box touches `bbox` is absent here even when its geometry misses.
    pub fn disjoint(&self, bbox: &BBox) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| !e.bbox.intersects(bbox))
            .map(|e| e.slot)
            .collect()
    }

    /// The indexed box of a slot, if that slot was indexed.
    pub fn bbox_of(&self, slot: usize) -> Option<BBox> {
        self.entries
            .iter()
            .find(|e| e.slot == slot)
            .map(|e| e.bbox)
    }
}
