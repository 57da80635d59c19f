//! Geometry-replacing operations: buffering, cutting, reprojection.

use crate::collection::FeatureCollection;
use crate::engine::{self, Projector};
use crate::error::{KartaError, Result};
use crate::feature::Feature;
use crate::types::GeometryKind;
use geo::{Geometry, Intersects, MultiPolygon};

/// Buffer distance: one value for every feature, or derived per feature.
pub enum BufferDistance<'a> {
    Constant(f64),
    PerFeature(&'a dyn Fn(&FeatureCollection, &Feature) -> f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Round,
    Mitre,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    Flat,
    Square,
}

/// Buffer configuration.
///
/// `cap_style` shapes point buffers: round rings, squares, or nothing at
/// all for flat caps. The line/polygon offsetting kernel produces round
/// joins and caps, so `join_style` and `mitre_limit` are validated but do
/// not change its output yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    pub join_style: JoinStyle,
    pub cap_style: CapStyle,
    pub mitre_limit: f64,
    /// Treat coordinates as lon/lat and distances as meters. Point
    /// geometries only.
    pub geodetic: bool,
    /// Vertices per quarter-ish of a ring; resolution of point buffers.
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            join_style: JoinStyle::Round,
            cap_style: CapStyle::Round,
            mitre_limit: 5.0,
            geodetic: false,
            segments: 64,
        }
    }
}

/// Buffer every geometry of a collection by a distance.
///
/// The output collection is tagged polygonal regardless of the input kind.
/// Geodetic buffering is supported for point geometries only. Point
/// buffers honor `cap_style`: a flat cap buffers a point to nothing. Line
/// and polygon offsets always get round joins from the kernel. Features
/// whose buffer comes out empty (non-positive distances on points and
/// lines, flat-capped points) are dropped; geometry-less features pass
/// through.
///
/// # Errors
///
/// `UnsupportedGeometryType` for geodetic buffering of non-point
/// geometries; `InvalidInput` for a non-finite distance or non-positive
/// mitre limit.
pub fn buffer(
    data: &FeatureCollection,
    distance: &BufferDistance<'_>,
    params: &BufferParams,
) -> Result<FeatureCollection> {
    if params.mitre_limit <= 0.0 {
        return Err(KartaError::InvalidInput(format!(
            "mitre limit must be positive, got {}",
            params.mitre_limit
        )));
    }
    let mut out = data.like();
    for feat in data.features() {
        let Some(geom) = feat.geometry() else {
            out.push(feat.row().to_vec(), None);
            continue;
        };
        let d = match distance {
            BufferDistance::Constant(d) => *d,
            BufferDistance::PerFeature(f) => f(data, feat),
        };
        if !d.is_finite() {
            return Err(KartaError::InvalidInput(format!(
                "buffer distance for feature {} is not finite",
                feat.id()
            )));
        }

        let kind = GeometryKind::of(geom);
        let point_like = kind.is_some_and(GeometryKind::is_point_like);
        let buffered: MultiPolygon = if params.geodetic {
            if !point_like {
                return Err(KartaError::UnsupportedGeometryType {
                    operation: "buffer (geodetic)",
                    kind: kind.map(GeometryKind::name).unwrap_or("GeometryCollection"),
                });
            }
            MultiPolygon::new(
                engine::point_parts(geom)
                    .into_iter()
                    .filter_map(|p| match params.cap_style {
                        CapStyle::Round => Some(engine::geodetic_circle(p, d, params.segments)),
                        CapStyle::Square => Some(engine::geodetic_square(p, d)),
                        CapStyle::Flat => None,
                    })
                    .collect(),
            )
        } else if point_like && params.cap_style != CapStyle::Round {
            MultiPolygon::new(
                engine::point_parts(geom)
                    .into_iter()
                    .filter_map(|p| match params.cap_style {
                        CapStyle::Square => Some(engine::planar_square(p, d)),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            engine::buffer_geometry(geom, d, params.segments)
        };

        if buffered.0.is_empty() || d <= 0.0 && !matches!(geom, Geometry::Polygon(_) | Geometry::MultiPolygon(_)) {
            log::debug!("buffer dropped feature {} (empty result)", feat.id());
            continue;
        }
        let geometry = if buffered.0.len() == 1 {
            let mut polys = buffered.0;
            Geometry::Polygon(polys.swap_remove(0))
        } else {
            Geometry::MultiPolygon(buffered)
        };
        out.push(feat.row().to_vec(), Some(geometry));
    }
    out.set_geometry_type(Some(GeometryKind::Polygon));
    Ok(out)
}

fn reject_points(operation: &'static str, data: &FeatureCollection) -> Result<()> {
    for feat in data.features() {
        if feat.kind().is_some_and(GeometryKind::is_point_like) {
            return Err(KartaError::UnsupportedGeometryType {
                operation,
                kind: feat.kind().map(GeometryKind::name).unwrap_or("Point"),
            });
        }
    }
    Ok(())
}

/// Split each feature of `data` by the union of the `cutter` polygons that
/// intersect it.
///
/// Cutter candidates are pruned by bounding box and filtered by exact
/// intersection before their union is applied. Features no cutter touches
/// keep their geometry unchanged.
///
/// # Errors
///
/// `UnsupportedGeometryType` for point geometry on either side, and for
/// non-polygonal cutter geometries, which the overlay engine cannot cut
/// with.
pub fn cut(data: &FeatureCollection, cutter: &FeatureCollection) -> Result<FeatureCollection> {
    reject_points("cut", data)?;
    reject_points("cut", cutter)?;
    for feat in cutter.features() {
        if let Some(kind) = feat.kind() {
            if !matches!(kind, GeometryKind::Polygon | GeometryKind::MultiPolygon) {
                return Err(KartaError::UnsupportedGeometryType {
                    operation: "cut",
                    kind: kind.name(),
                });
            }
        }
    }

    let mut out = data.like();
    for feat in data.features() {
        let (Some(geom), Some(bbox)) = (feat.geometry(), feat.bbox()) else {
            out.push(feat.row().to_vec(), feat.geometry().cloned());
            continue;
        };
        let blades: Vec<&Geometry> = cutter
            .overlapping(&bbox)
            .into_iter()
            .filter_map(|c| c.geometry())
            .filter(|cg| cg.intersects(geom))
            .collect();
        let pieces = engine::union_polygons(blades.iter().copied())
            .and_then(|union| engine::split_geometry(geom, &union));
        match pieces {
            Some(split) => out.push(feat.row().to_vec(), Some(split)),
            None => out.push(feat.row().to_vec(), Some(geom.clone())),
        };
    }
    Ok(out)
}

/// Reproject every coordinate of every geometry from one CRS to another,
/// on a copy of the collection.
///
/// # Errors
///
/// `Projection` for an unusable CRS or a coordinate the transform rejects.
pub fn reproject(
    data: &FeatureCollection,
    from_crs: &str,
    to_crs: &str,
) -> Result<FeatureCollection> {
    let projector = Projector::new(from_crs, to_crs)?;
    let mut out = data.like();
    for feat in data.features() {
        let geometry = match feat.geometry() {
            Some(geom) => Some(engine::reproject_geometry(geom, &projector)?),
            None => None,
        };
        out.push(feat.row().to_vec(), geometry);
    }
    Ok(out)
}
