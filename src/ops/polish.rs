//! Geometry polishing: repairing/simplifying and vertex snapping.

use crate::collection::FeatureCollection;
use crate::engine;
use crate::types::BBox;
use geo::{CoordsIter, Distance, Euclidean, Geometry, HasDimensions, MapCoords, Point};

/// Repair and simplify every geometry of a collection.
///
/// Invalid polygons get a repair attempt first; all geometries then pass a
/// vertex-simplification bounded by `tolerance` (zero only drops repeated
/// points). Features still invalid after repair, or left empty, are dropped
/// from the result. Lossy by contract, logged at debug level. Geometry-less
/// features pass through unchanged.
pub fn clean(data: &FeatureCollection, tolerance: f64, preserve_topology: bool) -> FeatureCollection {
    let mut out = data.like();
    let mut dropped = 0usize;
    for feat in data.features() {
        let Some(geom) = feat.geometry() else {
            out.push(feat.row().to_vec(), None);
            continue;
        };
        match engine::repair(geom.clone()) {
            Some(repaired) => {
                let simplified = engine::simplify_geometry(&repaired, tolerance, preserve_topology);
                if simplified.is_empty() {
                    dropped += 1;
                } else {
                    out.push(feat.row().to_vec(), Some(simplified));
                }
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::debug!("clean dropped {dropped} unrepairable features");
    }
    out
}

fn nearest_vertex(p: Point, geom: &Geometry) -> Option<(Point, f64)> {
    geom.coords_iter()
        .map(|c| {
            let q = Point::from(c);
            (q, Euclidean.distance(p, q))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Snap vertices of a copy of `data` onto nearby vertices of `other`.
///
/// For each feature, `other` candidates are pruned by a tolerance-expanded
/// box and confirmed by exact distance; each confirmed candidate in turn
/// pulls every vertex within `tolerance` onto its nearest vertex. Snapping
/// against multiple nearby features compounds: a vertex moved by one
/// candidate may move again toward the next. No closest-only guarantee.
pub fn snap(data: &FeatureCollection, other: &FeatureCollection, tolerance: f64) -> FeatureCollection {
    let mut out = data.like();
    for feat in data.features() {
        let Some(geom) = feat.geometry() else {
            out.push(feat.row().to_vec(), None);
            continue;
        };
        let mut current = geom.clone();
        let search = feat
            .bbox()
            .map(|b| b.expand(tolerance))
            .unwrap_or_else(|| BBox::new(0.0, 0.0, 0.0, 0.0));
        for cand in other.overlapping(&search) {
            let Some(cand_geom) = cand.geometry() else { continue };
            if engine::min_distance(&current, cand_geom) > tolerance {
                continue;
            }
            current = current.map_coords(|c| {
                match nearest_vertex(Point::new(c.x, c.y), cand_geom) {
                    Some((q, d)) if d <= tolerance => geo::coord! { x: q.x(), y: q.y() },
                    _ => c,
                }
            });
        }
        out.push(feat.row().to_vec(), Some(current));
    }
    out
}
