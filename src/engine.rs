//! Narrow seam over the external geometry and projection collaborators.
//!
//! Everything that needs exact geometry math goes through here: predicate
//! tests, clipping, buffering, splitting, repair, simplification, geodesic
//! paths, and coordinate reprojection. The rest of the crate only works in
//! bounding-box space and delegates to these wrappers.

use crate::error::{KartaError, Result};
use crate::types::BBox;
use geo::{
    BooleanOps, Buffer, ClosestPoint, CoordsIter, Destination, Distance, Euclidean,
    Geometry, HasDimensions, Haversine, InterpolatePoint, Intersects, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Relate, RemoveRepeatedPoints,
    Simplify, SimplifyVwPreserve, Validation,
};
use std::str::FromStr;

/// Exact spatial relation between two geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialPredicate {
    Intersects,
    Within,
    Contains,
    Crosses,
    Touches,
    Equals,
    Distance,
    Disjoint,
}

impl FromStr for SpatialPredicate {
    type Err = KartaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "intersects" => Ok(SpatialPredicate::Intersects),
            "within" => Ok(SpatialPredicate::Within),
            "contains" => Ok(SpatialPredicate::Contains),
            "crosses" => Ok(SpatialPredicate::Crosses),
            "touches" => Ok(SpatialPredicate::Touches),
            "equals" => Ok(SpatialPredicate::Equals),
            "distance" => Ok(SpatialPredicate::Distance),
            "disjoint" => Ok(SpatialPredicate::Disjoint),
            other => Err(KartaError::UnknownPredicate(other.to_string())),
        }
    }
}

impl SpatialPredicate {
    /// Evaluate the predicate exactly. `Distance` is not a boolean relation
    /// and always reports false here; callers use [`min_distance`] instead.
    pub fn evaluate(self, a: &Geometry, b: &Geometry) -> bool {
        match self {
            SpatialPredicate::Intersects => a.intersects(b),
            SpatialPredicate::Disjoint => !a.intersects(b),
            SpatialPredicate::Within => a.relate(b).is_within(),
            SpatialPredicate::Contains => a.relate(b).is_contains(),
            SpatialPredicate::Crosses => {
                a.relate(b).is_crosses()
            }
            SpatialPredicate::Touches => {
                a.relate(b).is_touches()
            }
            SpatialPredicate::Equals => a.relate(b).is_equal_topo(),
            SpatialPredicate::Distance => false,
        }
    }
}

/// Split a geometry into its single-part components.
///
/// Multi-part geometries yield one entry per part; `Line`, `Rect` and
/// `Triangle` are normalized to `LineString`/`Polygon`.
pub fn flatten_parts(geometry: &Geometry) -> Vec<Geometry> {
    match geometry {
        Geometry::MultiPoint(mp) => mp.iter().map(|p| Geometry::Point(*p)).collect(),
        Geometry::MultiLineString(mls) => mls
            .iter()
            .map(|ls| Geometry::LineString(ls.clone()))
            .collect(),
        Geometry::MultiPolygon(mp) => {
            mp.iter().map(|p| Geometry::Polygon(p.clone())).collect()
        }
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(flatten_parts).collect(),
        Geometry::Line(l) => vec![Geometry::LineString(LineString::from(*l))],
        Geometry::Rect(r) => vec![Geometry::Polygon(r.to_polygon())],
        Geometry::Triangle(t) => vec![Geometry::Polygon(t.to_polygon())],
        other => vec![other.clone()],
    }
}

/// All point parts of a geometry; empty for non-point geometries.
pub fn point_parts(geometry: &Geometry) -> Vec<Point> {
    match geometry {
        Geometry::Point(p) => vec![*p],
        Geometry::MultiPoint(mp) => mp.iter().copied().collect(),
        _ => Vec::new(),
    }
}

fn distance_to_part(p: Point, part: &Geometry) -> f64 {
    let closest = match part {
        Geometry::Point(q) => return Euclidean.distance(p, *q),
        Geometry::LineString(ls) => ls.closest_point(&p),
        Geometry::Polygon(poly) => poly.closest_point(&p),
        other => {
            return flatten_parts(other)
                .iter()
                .map(|g| distance_to_part(p, g))
                .fold(f64::INFINITY, f64::min);
        }
    };
    match closest {
        geo::Closest::Intersection(_) => 0.0,
        geo::Closest::SinglePoint(q) => Euclidean.distance(p, q),
        geo::Closest::Indeterminate => f64::INFINITY,
    }
}

/// Minimum planar distance between two geometries.
///
/// Zero when they intersect; otherwise the minimum over each geometry's
/// vertices against the other geometry, which attains the true minimum for
/// point/line/polygon inputs.
pub fn min_distance(a: &Geometry, b: &Geometry) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    let parts_a = flatten_parts(a);
    let parts_b = flatten_parts(b);
    let mut best = f64::INFINITY;
    for part in &parts_b {
        for coord in a.coords_iter() {
            best = best.min(distance_to_part(Point::from(coord), part));
        }
    }
    for part in &parts_a {
        for coord in b.coords_iter() {
            best = best.min(distance_to_part(Point::from(coord), part));
        }
    }
    best
}

fn non_empty(geometry: Geometry) -> Option<Geometry> {
    if geometry.is_empty() { None } else { Some(geometry) }
}

/// Exact intersection of a geometry with a rectangle, `None` when empty.
pub fn clip_to_rect(geometry: &Geometry, bbox: &BBox) -> Option<Geometry> {
    let window = bbox.to_polygon();
    match geometry {
        Geometry::Point(p) => bbox
            .contains_point(p.x(), p.y())
            .then(|| Geometry::Point(*p)),
        Geometry::MultiPoint(mp) => {
            let kept: Vec<Point> = mp
                .iter()
                .filter(|p| bbox.contains_point(p.x(), p.y()))
                .copied()
                .collect();
            (!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept)))
        }
        Geometry::LineString(ls) => {
            let clipped = window.clip(&MultiLineString::new(vec![ls.clone()]), false);
            non_empty(Geometry::MultiLineString(clipped))
        }
        Geometry::MultiLineString(mls) => {
            let clipped = window.clip(mls, false);
            non_empty(Geometry::MultiLineString(clipped))
        }
        Geometry::Polygon(p) => non_empty(Geometry::MultiPolygon(p.intersection(&window))),
        Geometry::MultiPolygon(mp) => {
            non_empty(Geometry::MultiPolygon(mp.intersection(&window)))
        }
        other => {
            let parts: Vec<Geometry> = flatten_parts(other)
                .iter()
                .filter_map(|g| clip_to_rect(g, bbox))
                .collect();
            match parts.len() {
                0 => None,
                1 => parts.into_iter().next(),
                _ => Some(Geometry::GeometryCollection(geo::GeometryCollection::new_from(
                    parts,
                ))),
            }
        }
    }
}

/// A ring of `segments` vertices around a planar center.
fn planar_circle(center: Point, radius: f64, segments: usize) -> Polygon {
    let n = segments.max(8);
    let ring: Vec<(f64, f64)> = (0..=n)
        .map(|i| {
            let theta = (i as f64 / n as f64) * std::f64::consts::TAU;
            (
                center.x() + radius * theta.cos(),
                center.y() + radius * theta.sin(),
            )
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Axis-aligned square of half-width `radius` around a planar center, the
/// square-cap counterpart of a point ring.
pub fn planar_square(center: Point, radius: f64) -> Polygon {
    let (x, y) = (center.x(), center.y());
    Polygon::new(
        LineString::from(vec![
            (x - radius, y - radius),
            (x + radius, y - radius),
            (x + radius, y + radius),
            (x - radius, y + radius),
            (x - radius, y - radius),
        ]),
        vec![],
    )
}

/// Geodesic square around a lon/lat center: corner destinations on the
/// diagonal bearings, so the sides span `2 * radius_meters`.
pub fn geodetic_square(center: Point, radius_meters: f64) -> Polygon {
    let corner = radius_meters * std::f64::consts::SQRT_2;
    let ring: Vec<(f64, f64)> = [45.0, 135.0, 225.0, 315.0, 45.0]
        .iter()
        .map(|&bearing| {
            let p = Haversine.destination(center, bearing, corner);
            (p.x(), p.y())
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// A geodesic ring of `segments` vertices around a lon/lat center, built
/// from great-circle destinations at stepped bearings.
pub fn geodetic_circle(center: Point, radius_meters: f64, segments: usize) -> Polygon {
    let n = segments.max(8);
    let ring: Vec<(f64, f64)> = (0..=n)
        .map(|i| {
            let bearing = (i as f64 / n as f64) * 360.0;
            let p = Haversine.destination(center, bearing, radius_meters);
            (p.x(), p.y())
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Planar buffer of any geometry; the result is always polygonal.
///
/// Points become explicit rings; lines and polygons go through the
/// offsetting kernel, which produces rounded joins.
pub fn buffer_geometry(geometry: &Geometry, distance: f64, segments: usize) -> MultiPolygon {
    match geometry {
        Geometry::Point(p) => MultiPolygon::new(vec![planar_circle(*p, distance, segments)]),
        Geometry::MultiPoint(mp) => MultiPolygon::new(
            mp.iter()
                .map(|p| planar_circle(*p, distance, segments))
                .collect(),
        ),
        other => other.buffer(distance),
    }
}

/// Attempt to repair an invalid geometry; polygonal inputs go through a
/// zero-distance buffer, the classic bowtie fix. Returns the input
/// unchanged when already valid, `None` when still invalid afterwards.
pub fn repair(geometry: Geometry) -> Option<Geometry> {
    if geometry.is_valid() {
        return Some(geometry);
    }
    match &geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
            let fixed = Geometry::MultiPolygon(geometry.buffer(0.0));
            fixed.is_valid().then_some(fixed)
        }
        _ => None,
    }
}

/// Vertex simplification bounded by `tolerance`; zero tolerance only drops
/// repeated points.
pub fn simplify_geometry(geometry: &Geometry, tolerance: f64, preserve_topology: bool) -> Geometry {
    if tolerance <= 0.0 {
        return match geometry {
            Geometry::LineString(ls) => Geometry::LineString(ls.remove_repeated_points()),
            Geometry::MultiLineString(mls) => {
                Geometry::MultiLineString(mls.remove_repeated_points())
            }
            Geometry::Polygon(p) => Geometry::Polygon(p.remove_repeated_points()),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.remove_repeated_points()),
            other => other.clone(),
        };
    }
    macro_rules! simplified {
        ($g:expr) => {
            if preserve_topology {
                $g.simplify_vw_preserve(tolerance)
            } else {
                $g.simplify(tolerance)
            }
        };
    }
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(simplified!(ls)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(simplified!(mls)),
        Geometry::Polygon(p) => Geometry::Polygon(simplified!(p)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(simplified!(mp)),
        other => other.clone(),
    }
}

/// Union of the polygonal parts of the given geometries.
pub fn union_polygons<'a, I: IntoIterator<Item = &'a Geometry>>(geoms: I) -> Option<MultiPolygon> {
    let mut acc: Option<MultiPolygon> = None;
    for geom in geoms {
        for part in flatten_parts(geom) {
            if let Geometry::Polygon(p) = part {
                let mp = MultiPolygon::new(vec![p]);
                acc = Some(match acc {
                    Some(prev) => prev.union(&mp),
                    None => mp,
                });
            }
        }
    }
    acc
}

/// Split a line or polygon by a polygonal cutter: the pieces inside and
/// outside the cutter, collected into one multi-part geometry.
pub fn split_geometry(geometry: &Geometry, cutter: &MultiPolygon) -> Option<Geometry> {
    match geometry {
        Geometry::LineString(ls) => {
            split_geometry(&Geometry::MultiLineString(MultiLineString::new(vec![ls.clone()])), cutter)
        }
        Geometry::MultiLineString(mls) => {
            let inside = cutter.clip(mls, false);
            let outside = cutter.clip(mls, true);
            let pieces: Vec<LineString> =
                inside.into_iter().chain(outside).filter(|ls| !ls.is_empty()).collect();
            (!pieces.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(pieces)))
        }
        Geometry::Polygon(p) => split_geometry(
            &Geometry::MultiPolygon(MultiPolygon::new(vec![p.clone()])),
            cutter,
        ),
        Geometry::MultiPolygon(mp) => {
            let mut pieces: Vec<Polygon> = mp.intersection(cutter).into_iter().collect();
            pieces.extend(mp.difference(cutter));
            pieces.retain(|p| !p.is_empty());
            (!pieces.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(pieces)))
        }
        _ => None,
    }
}

/// Great-circle path between two points with `segments` vertices, the
/// endpoints included.
pub fn great_circle_path(from: Point, to: Point, segments: usize) -> LineString {
    if segments < 3 {
        return LineString::from(vec![(from.x(), from.y()), (to.x(), to.y())]);
    }
    let last = (segments - 1) as f64;
    LineString::from(
        (0..segments)
            .map(|i| {
                let p = Haversine.point_at_ratio_between(from, to, i as f64 / last);
                (p.x(), p.y())
            })
            .collect::<Vec<_>>(),
    )
}

/// Coordinate transformer between two named CRS, wrapping the projection
/// collaborator. Geographic ends are converted between degrees and the
/// radians the collaborator works in.
pub struct Projector {
    source: proj4rs::Proj,
    target: proj4rs::Proj,
    source_geographic: bool,
    target_geographic: bool,
}

/// Expand the handful of well-known EPSG shorthands; proj strings pass
/// through untouched.
fn crs_to_proj_string(crs: &str) -> Result<String> {
    let trimmed = crs.trim();
    if trimmed.starts_with("+proj=") {
        return Ok(trimmed.to_string());
    }
    match trimmed.to_ascii_uppercase().as_str() {
        "EPSG:4326" | "WGS84" => Ok("+proj=longlat +datum=WGS84 +no_defs".to_string()),
        "EPSG:3857" => Ok(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"
                .to_string(),
        ),
        "EPSG:32633" => Ok("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs".to_string()),
        other => Err(KartaError::Projection(format!(
            "unsupported CRS '{other}': pass a proj string"
        ))),
    }
}

fn is_geographic(proj_string: &str) -> bool {
    proj_string.contains("longlat") || proj_string.contains("latlong")
}

impl Projector {
    pub fn new(from_crs: &str, to_crs: &str) -> Result<Self> {
        let from = crs_to_proj_string(from_crs)?;
        let to = crs_to_proj_string(to_crs)?;
        let source = proj4rs::Proj::from_proj_string(&from)
            .map_err(|e| KartaError::Projection(format!("invalid source CRS: {e:?}")))?;
        let target = proj4rs::Proj::from_proj_string(&to)
            .map_err(|e| KartaError::Projection(format!("invalid target CRS: {e:?}")))?;
        Ok(Self {
            source,
            target,
            source_geographic: is_geographic(&from),
            target_geographic: is_geographic(&to),
        })
    }

    /// Transform one coordinate pair from the source to the target CRS.
    pub fn project(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| KartaError::Projection(format!("transform failed: {e:?}")))?;
        if self.target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

/// Transform every coordinate of a geometry through a projector.
pub fn reproject_geometry(geometry: &Geometry, projector: &Projector) -> Result<Geometry> {
    use geo::MapCoords;
    geometry.try_map_coords(|c| {
        let (x, y) = projector.project(c.x, c.y)?;
        Ok(geo::coord! { x: x, y: y })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    fn unit_square() -> Geometry {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ])
    }

    #[test]
    fn test_predicate_parsing() {
        assert_eq!(
            "Intersects".parse::<SpatialPredicate>().unwrap(),
            SpatialPredicate::Intersects
        );
        assert!(matches!(
            "overlapping".parse::<SpatialPredicate>(),
            Err(KartaError::UnknownPredicate(_))
        ));
    }

    #[test]
    fn test_predicate_evaluation() {
        let square = unit_square();
        let inner = Geometry::Point(Point::new(0.5, 0.5));
        let outer = Geometry::Point(Point::new(5.0, 5.0));

        assert!(SpatialPredicate::Intersects.evaluate(&square, &inner));
        assert!(SpatialPredicate::Contains.evaluate(&square, &inner));
        assert!(SpatialPredicate::Within.evaluate(&inner, &square));
        assert!(SpatialPredicate::Disjoint.evaluate(&square, &outer));
        assert!(!SpatialPredicate::Disjoint.evaluate(&square, &inner));
    }

    #[test]
    fn test_min_distance() {
        let square = unit_square();
        let p = Geometry::Point(Point::new(3.0, 0.0));
        assert!((min_distance(&square, &p) - 2.0).abs() < 1e-9);
        assert_eq!(
            min_distance(&square, &Geometry::Point(Point::new(0.5, 0.5))),
            0.0
        );
    }

    #[test]
    fn test_clip_point_and_polygon() {
        let bbox = BBox::new(0.0, 0.0, 2.0, 2.0);
        assert!(clip_to_rect(&Geometry::Point(Point::new(1.0, 1.0)), &bbox).is_some());
        assert!(clip_to_rect(&Geometry::Point(Point::new(3.0, 3.0)), &bbox).is_none());

        let big = Geometry::Polygon(polygon![
            (x: 1.0, y: 1.0),
            (x: 5.0, y: 1.0),
            (x: 5.0, y: 5.0),
            (x: 1.0, y: 5.0),
        ]);
        let clipped = clip_to_rect(&big, &bbox).unwrap();
        let clipped_bbox = BBox::of_geometry(&clipped).unwrap();
        assert!(clipped_bbox.max_x() <= 2.0 + 1e-9);
        assert!(clipped_bbox.max_y() <= 2.0 + 1e-9);
    }

    #[test]
    fn test_clip_line() {
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0);
        let line = Geometry::LineString(line_string![
            (x: -1.0, y: 0.5),
            (x: 2.0, y: 0.5),
        ]);
        let clipped = clip_to_rect(&line, &bbox).unwrap();
        let b = BBox::of_geometry(&clipped).unwrap();
        assert!(b.min_x() >= -1e-9 && b.max_x() <= 1.0 + 1e-9);
    }

    #[test]
    fn test_point_buffer_bbox_expands_by_distance() {
        let buffered = buffer_geometry(&Geometry::Point(Point::new(10.0, 10.0)), 2.0, 64);
        let bbox = BBox::of_geometry(&Geometry::MultiPolygon(buffered)).unwrap();
        assert!((bbox.min_x() - 8.0).abs() < 0.05);
        assert!((bbox.max_y() - 12.0).abs() < 0.05);
    }

    #[test]
    fn test_great_circle_path_vertex_count() {
        let path = great_circle_path(Point::new(0.0, 0.0), Point::new(10.0, 10.0), 50);
        assert_eq!(path.coords_count(), 50);
        let first = path.0.first().unwrap();
        let last = path.0.last().unwrap();
        assert!((first.x - 0.0).abs() < 1e-9);
        assert!((last.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_polygon_by_polygon() {
        let target = unit_square();
        let cutter = MultiPolygon::new(vec![polygon![
            (x: 0.5, y: -1.0),
            (x: 2.0, y: -1.0),
            (x: 2.0, y: 2.0),
            (x: 0.5, y: 2.0),
        ]]);
        let pieces = split_geometry(&target, &cutter).unwrap();
        if let Geometry::MultiPolygon(mp) = pieces {
            assert_eq!(mp.0.len(), 2);
        } else {
            panic!("expected multipolygon pieces");
        }
    }

    #[test]
    fn test_projector_roundtrip_wgs84_to_mercator() {
        let projector = Projector::new("EPSG:4326", "EPSG:3857").unwrap();
        let (x, y) = projector.project(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let (x, _) = projector.project(180.0, 0.0).unwrap();
        assert!((x - 20_037_508.342_789_244).abs() < 1.0);

        let back = Projector::new("EPSG:3857", "EPSG:4326").unwrap();
        let (lon, lat) = back.project(x, 0.0).unwrap();
        assert!((lon - 180.0).abs() < 1e-6);
        assert!(lat.abs() < 1e-6);
    }

    #[test]
    fn test_unknown_crs_is_rejected() {
        assert!(matches!(
            Projector::new("EPSG:99999", "EPSG:4326"),
            Err(KartaError::Projection(_))
        ));
    }
}
