//! Selection operations: crop to a box, tile into a grid, select by
//! spatial relation against another collection.

use crate::collection::FeatureCollection;
use crate::engine::{self, SpatialPredicate};
use crate::error::{KartaError, Result};
use crate::types::BBox;
use geo::Intersects;
use rustc_hash::FxHashSet;

/// Exact crop of a collection to a bounding box.
///
/// Candidates are pruned through the spatial index, then clipped exactly;
/// features whose intersection is empty are dropped. Rows are copied
/// unchanged, geometries replaced with the clipped ones.
pub fn crop(data: &FeatureCollection, bbox: &BBox) -> FeatureCollection {
    let mut out = data.like();
    for feat in data.overlapping(bbox) {
        let Some(geom) = feat.geometry() else { continue };
        if let Some(clipped) = engine::clip_to_rect(geom, bbox) {
            out.push(feat.row().to_vec(), Some(clipped));
        }
    }
    out
}

/// Grid layout for [`tile`]: explicit cell size in coordinate units, or a
/// cell count per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileSpec {
    Size(f64, f64),
    Counts(usize, usize),
}

/// Lazily crop a collection into grid cells.
///
/// The grid starts at the data bbox minimum and steps by the cell size;
/// the final row and column are clipped to the bbox maximum instead of
/// overshooting. Cells that catch no features are skipped, not yielded.
///
/// # Errors
///
/// `InvalidInput` when the collection has no bounding box or the spec is
/// non-positive.
pub fn tile(
    data: &FeatureCollection,
    spec: TileSpec,
) -> Result<impl Iterator<Item = (BBox, FeatureCollection)> + '_> {
    let bbox = data
        .bbox()
        .ok_or_else(|| KartaError::InvalidInput("cannot tile a collection with no bounding box".into()))?;
    let (tile_w, tile_h, cols, rows) = match spec {
        TileSpec::Size(w, h) => {
            if w <= 0.0 || h <= 0.0 {
                return Err(KartaError::InvalidInput(format!(
                    "tile size must be positive, got {w} x {h}"
                )));
            }
            let cols = (bbox.width() / w).ceil().max(1.0) as usize;
            let rows = (bbox.height() / h).ceil().max(1.0) as usize;
            (w, h, cols, rows)
        }
        TileSpec::Counts(nx, ny) => {
            if nx == 0 || ny == 0 {
                return Err(KartaError::InvalidInput("tile counts must be positive".into()));
            }
            (bbox.width() / nx as f64, bbox.height() / ny as f64, nx, ny)
        }
    };

    // the grid is indexed rather than accumulated so the final row and
    // column land exactly on the bbox maximum
    let mut cells = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        let min_y = bbox.min_y() + row as f64 * tile_h;
        let max_y = (bbox.min_y() + (row + 1) as f64 * tile_h).min(bbox.max_y());
        for col in 0..cols {
            let min_x = bbox.min_x() + col as f64 * tile_w;
            let max_x = (bbox.min_x() + (col + 1) as f64 * tile_w).min(bbox.max_x());
            cells.push(BBox::new(min_x, min_y, max_x, max_y));
        }
    }
    log::debug!("tiling into {} cells of {tile_w} x {tile_h}", cells.len());

    Ok(cells.into_iter().filter_map(move |cell| {
        let cropped = crop(data, &cell);
        (!cropped.is_empty()).then_some((cell, cropped))
    }))
}

/// Select the features of `data` that stand in `predicate` to `other`.
///
/// - `Distance` requires `radius` and matches a feature when its minimum
///   distance to any `other` feature is within it; the first match
///   short-circuits. Full scan, not index-accelerated.
/// - Topological predicates prune candidate pairs through both indexes,
///   confirm with the exact relation, and short-circuit on first match.
/// - `Disjoint` matches only features exactly disjoint from every `other`
///   feature whose box could overlap them; features whose box overlaps no
///   `other` box qualify straight from the index.
///
/// Output keeps `data`'s schema and the original (unclipped) geometries.
/// Geometry-less features never match.
///
/// # Errors
///
/// `MissingParameter` when `predicate` is `Distance` and `radius` is absent.
pub fn select_by_location(
    data: &FeatureCollection,
    other: &FeatureCollection,
    predicate: SpatialPredicate,
    radius: Option<f64>,
) -> Result<FeatureCollection> {
    let mut out = data.like();
    match predicate {
        SpatialPredicate::Distance => {
            let radius = radius.ok_or(KartaError::MissingParameter {
                operation: "select_by_location",
                param: "radius",
            })?;
            for feat in data.features() {
                let Some(geom) = feat.geometry() else { continue };
                let near = other
                    .features()
                    .iter()
                    .filter_map(|o| o.geometry())
                    .any(|og| engine::min_distance(geom, og) <= radius);
                if near {
                    out.push(feat.row().to_vec(), Some(geom.clone()));
                }
            }
        }
        SpatialPredicate::Disjoint => {
            // box provably misses everything in other: no exact test needed
            let fast: FxHashSet<_> = match other.bbox() {
                Some(other_bbox) => data
                    .disjoint(&other_bbox)
                    .into_iter()
                    .map(|f| f.id())
                    .collect(),
                None => data.features().iter().map(|f| f.id()).collect(),
            };
            for feat in data.features() {
                let Some(geom) = feat.geometry() else { continue };
                let qualifies = fast.contains(&feat.id())
                    || feat.bbox().is_some_and(|b| {
                        other
                            .overlapping(&b)
                            .iter()
                            .filter_map(|o| o.geometry())
                            .all(|og| !geom.intersects(og))
                    });
                if qualifies {
                    out.push(feat.row().to_vec(), Some(geom.clone()));
                }
            }
        }
        _ => {
            for feat in data.features() {
                let (Some(geom), Some(bbox)) = (feat.geometry(), feat.bbox()) else {
                    continue;
                };
                let matched = other
                    .overlapping(&bbox)
                    .iter()
                    .filter_map(|o| o.geometry())
                    .any(|og| predicate.evaluate(geom, og));
                if matched {
                    out.push(feat.row().to_vec(), Some(geom.clone()));
                }
            }
        }
    }
    Ok(out)
}
