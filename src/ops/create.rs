//! Creating new datasets from existing ones: point-to-point connections
//! and geometry-to-point conversion.

use crate::collection::FeatureCollection;
use crate::engine;
use crate::error::{KartaError, Result};
use crate::types::{GeometryKind, Value};
use geo::{Centroid, CoordsIter, Geometry, LineString, Point};
use std::str::FromStr;

fn point_rows<'a>(data: &'a FeatureCollection) -> Vec<(&'a [Value], Point)> {
    data.features()
        .iter()
        .flat_map(|feat| {
            feat.geometry()
                .map(|g| engine::point_parts(g))
                .unwrap_or_default()
                .into_iter()
                .map(move |p| (feat.row(), p))
        })
        .collect()
}

fn unique_field(existing: &[String], name: &str) -> String {
    if !existing.iter().any(|f| f == name) {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name}_{n}");
        if !existing.iter().any(|f| f == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// How [`to_points`] derives points from a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointMode {
    /// One point per vertex, hole rings included.
    Vertex,
    /// One centroid per feature.
    Centroid,
    /// One centroid per single-part component.
    MultiCentroid,
}

impl FromStr for PointMode {
    type Err = KartaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" => Ok(PointMode::Vertex),
            "centroid" => Ok(PointMode::Centroid),
            "multicentroid" => Ok(PointMode::MultiCentroid),
            other => Err(KartaError::UnknownMode(other.to_string())),
        }
    }
}

/// Convert any collection to point features, one output row per derived
/// point, each carrying its source feature's attributes.
///
/// `Vertex` emits every coordinate of every ring and line; `Centroid`
/// emits one centroid per feature and drops single-point features;
/// `MultiCentroid` emits one centroid per part of a multi geometry.
/// Point geometries pass through unchanged under `Vertex` and
/// `MultiCentroid`, and geometry-less features are carried through in
/// every mode.
pub fn to_points(data: &FeatureCollection, mode: PointMode) -> FeatureCollection {
    let mut out = data.like();
    out.set_geometry_type(None);
    for feat in data.features() {
        let Some(geom) = feat.geometry() else {
            out.push(feat.row().to_vec(), None);
            continue;
        };
        let kind = GeometryKind::of(geom);
        match mode {
            PointMode::Vertex => {
                if kind.is_some_and(GeometryKind::is_point_like) {
                    out.push(feat.row().to_vec(), Some(geom.clone()));
                } else {
                    for coord in geom.coords_iter() {
                        out.push(feat.row().to_vec(), Some(Geometry::Point(Point::from(coord))));
                    }
                }
            }
            PointMode::Centroid => {
                if kind == Some(GeometryKind::Point) {
                    continue;
                }
                match geom.centroid() {
                    Some(c) => {
                        out.push(feat.row().to_vec(), Some(Geometry::Point(c)));
                    }
                    None => log::debug!("to_points dropped feature {} (no centroid)", feat.id()),
                }
            }
            PointMode::MultiCentroid => {
                if kind.is_some_and(GeometryKind::is_point_like) {
                    out.push(feat.row().to_vec(), Some(geom.clone()));
                    continue;
                }
                for part in engine::flatten_parts(geom) {
                    match part.centroid() {
                        Some(c) => {
                            out.push(feat.row().to_vec(), Some(Geometry::Point(c)));
                        }
                        None => {
                            log::debug!("to_points dropped a part of feature {}", feat.id())
                        }
                    }
                }
            }
        }
    }
    out
}

/// Connect point features of `from` to point features of `to` wherever
/// their `key` values match.
///
/// A full cross product over both sides' flattened point parts, each
/// sub-part matched independently; null keys never match. Every match
/// emits a line feature: a great-circle path of `segments` vertices when
/// `great_circle` is set, otherwise a straight two-point line. The output
/// schema concatenates both inputs' fields, suffixing colliding names.
///
/// # Errors
///
/// `InvalidInput` when `key` is missing from either schema; `EmptyInput`
/// when either side has no point parts.
pub fn connect(
    from: &FeatureCollection,
    to: &FeatureCollection,
    key: &str,
    great_circle: bool,
    segments: usize,
) -> Result<FeatureCollection> {
    let from_key = from
        .field_index(key)
        .ok_or_else(|| KartaError::InvalidInput(format!("connect key '{key}' not in source fields")))?;
    let to_key = to
        .field_index(key)
        .ok_or_else(|| KartaError::InvalidInput(format!("connect key '{key}' not in target fields")))?;

    let from_points = point_rows(from);
    if from_points.is_empty() {
        return Err(KartaError::EmptyInput("connect: no source points"));
    }
    let to_points = point_rows(to);
    if to_points.is_empty() {
        return Err(KartaError::EmptyInput("connect: no target points"));
    }

    let mut fields: Vec<String> = from.fields().to_vec();
    for name in to.fields() {
        let unique = unique_field(&fields, name);
        fields.push(unique);
    }
    let mut out = FeatureCollection::new(fields)?;

    for (from_row, from_pt) in &from_points {
        let key_value = &from_row[from_key];
        if key_value.is_null() {
            continue;
        }
        for (to_row, to_pt) in &to_points {
            if &to_row[to_key] != key_value {
                continue;
            }
            let path: LineString = if great_circle {
                engine::great_circle_path(*from_pt, *to_pt, segments)
            } else {
                LineString::from(vec![
                    (from_pt.x(), from_pt.y()),
                    (to_pt.x(), to_pt.y()),
                ])
            };
            let mut row = from_row.to_vec();
            row.extend(to_row.iter().cloned());
            out.push(row, Some(Geometry::LineString(path)));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPoint, polygon};

    fn airports() -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["code", "name"]).unwrap();
        data.add_feature(
            vec![Value::from("OSL"), Value::from("Gardermoen")],
            Some(Geometry::Point(Point::new(11.1, 60.2))),
        )
        .unwrap();
        data.add_feature(
            vec![Value::from("TRD"), Value::from("Vaernes")],
            Some(Geometry::Point(Point::new(10.9, 63.5))),
        )
        .unwrap();
        data
    }

    fn destinations() -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["code", "city"]).unwrap();
        data.add_feature(
            vec![Value::from("OSL"), Value::from("New York")],
            Some(Geometry::Point(Point::new(-73.8, 40.6))),
        )
        .unwrap();
        data.add_feature(
            vec![Value::from("XXX"), Value::from("Nowhere")],
            Some(Geometry::Point(Point::new(0.0, 0.0))),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_connect_matching_keys_emit_lines() {
        let out = connect(&airports(), &destinations(), "code", true, 50).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.fields(), ["code", "name", "code_2", "city"]);

        let feat = &out.features()[0];
        assert_eq!(out.value(feat, "name"), Some(&Value::from("Gardermoen")));
        assert_eq!(out.value(feat, "city"), Some(&Value::from("New York")));
        let geom = feat.geometry().unwrap();
        assert_eq!(geom.coords_iter().count(), 50);
    }

    #[test]
    fn test_connect_straight_line_has_two_vertices() {
        let out = connect(&airports(), &destinations(), "code", false, 50).unwrap();
        let geom = out.features()[0].geometry().unwrap();
        assert_eq!(geom.coords_iter().count(), 2);
    }

    #[test]
    fn test_connect_flattens_multipoints() {
        let mut from = FeatureCollection::new(vec!["k"]).unwrap();
        from.add_feature(
            vec![Value::from("a")],
            Some(Geometry::MultiPoint(MultiPoint::from(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0),
            ]))),
        )
        .unwrap();
        let mut to = FeatureCollection::new(vec!["k"]).unwrap();
        to.add_feature(vec![Value::from("a")], Some(Geometry::Point(Point::new(5.0, 5.0))))
            .unwrap();

        let out = connect(&from, &to, "k", false, 10).unwrap();
        // each sub-part of the multipoint matched independently
        assert_eq!(out.len(), 2);
    }

    fn zones() -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["zone"]).unwrap();
        data.add_feature(
            vec![Value::from("a")],
            Some(Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 2.0, y: 0.0),
                (x: 2.0, y: 2.0),
                (x: 0.0, y: 2.0),
            ])),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_to_points_vertex_emits_every_coordinate() {
        let hole = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
            ],
            interiors: [[
                (x: 1.0, y: 1.0),
                (x: 2.0, y: 1.0),
                (x: 2.0, y: 2.0),
                (x: 1.0, y: 2.0),
            ]],
        ];
        let mut data = FeatureCollection::new(vec!["zone"]).unwrap();
        data.add_feature(vec![Value::from("a")], Some(Geometry::Polygon(hole)))
            .unwrap();

        let out = to_points(&data, PointMode::Vertex);
        // exterior and hole rings, closing coordinates included
        assert_eq!(out.len(), 10);
        assert_eq!(out.geometry_type(), Some(GeometryKind::Point));
        assert!(out
            .features()
            .iter()
            .all(|f| out.value(f, "zone") == Some(&Value::from("a"))));
    }

    #[test]
    fn test_to_points_centroid() {
        let out = to_points(&zones(), PointMode::Centroid);
        assert_eq!(out.len(), 1);
        let Some(Geometry::Point(c)) = out.features()[0].geometry() else {
            panic!("expected a centroid point");
        };
        assert!((c.x() - 1.0).abs() < 1e-9);
        assert!((c.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_points_centroid_drops_point_features() {
        let mut data = zones();
        data.add_feature(
            vec![Value::from("p")],
            Some(Geometry::Point(Point::new(9.0, 9.0))),
        )
        .unwrap();
        let out = to_points(&data, PointMode::Centroid);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(&out.features()[0], "zone"), Some(&Value::from("a")));
    }

    #[test]
    fn test_to_points_multicentroid_splits_parts() {
        let parts = geo::MultiPolygon::new(vec![
            polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
            ],
            polygon![
                (x: 10.0, y: 10.0),
                (x: 11.0, y: 10.0),
                (x: 11.0, y: 11.0),
                (x: 10.0, y: 11.0),
            ],
        ]);
        let mut data = FeatureCollection::new(vec!["zone"]).unwrap();
        data.add_feature(vec![Value::from("a")], Some(Geometry::MultiPolygon(parts)))
            .unwrap();

        let out = to_points(&data, PointMode::MultiCentroid);
        assert_eq!(out.len(), 2);
        let xs: Vec<f64> = out
            .features()
            .iter()
            .filter_map(|f| match f.geometry() {
                Some(Geometry::Point(p)) => Some(p.x()),
                _ => None,
            })
            .collect();
        assert!((xs[0] - 0.5).abs() < 1e-9);
        assert!((xs[1] - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_point_mode_parsing() {
        assert_eq!("MultiCentroid".parse::<PointMode>().unwrap(), PointMode::MultiCentroid);
        assert!(matches!(
            "edge".parse::<PointMode>(),
            Err(KartaError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_connect_errors() {
        let from = airports();
        let to = destinations();
        assert!(matches!(
            connect(&from, &to, "missing", true, 10),
            Err(KartaError::InvalidInput(_))
        ));

        let empty = FeatureCollection::new(vec!["code"]).unwrap();
        assert!(matches!(
            connect(&from, &empty, "code", true, 10),
            Err(KartaError::EmptyInput(_))
        ));
    }
}
