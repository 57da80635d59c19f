//! Dataset management: splitting into groups and merging schemas.

use crate::collection::FeatureCollection;
use crate::error::{KartaError, Result};
use crate::feature::Feature;
use crate::types::Value;
use rustc_hash::FxHashSet;

/// How [`split`] derives a group key from a feature.
pub enum SplitKey<'a> {
    /// One field's value.
    Field(&'a str),
    /// A tuple of field values.
    Fields(&'a [&'a str]),
    /// An arbitrary key function.
    Func(&'a dyn Fn(&FeatureCollection, &Feature) -> Value),
}

/// How [`split`] turns key values into groups.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupBreaks {
    /// One group per distinct key value.
    Unique,
    /// Numeric classification: group `i` holds keys `<= breaks[i]`, the
    /// last group everything above the final break. Keys with no numeric
    /// view are skipped.
    Breaks(Vec<f64>),
}

fn key_fn<'a>(
    data: &FeatureCollection,
    key: &'a SplitKey<'a>,
) -> Result<impl Fn(&FeatureCollection, &Feature) -> Vec<Value> + 'a> {
    let resolve = |name: &str| {
        data.field_index(name)
            .ok_or_else(|| KartaError::InvalidInput(format!("unknown split field '{name}'")))
    };
    let indices: Vec<usize> = match key {
        SplitKey::Field(name) => vec![resolve(name)?],
        SplitKey::Fields(names) => names
            .iter()
            .map(|n| resolve(n))
            .collect::<Result<Vec<_>>>()?,
        SplitKey::Func(_) => Vec::new(),
    };
    Ok(move |data: &FeatureCollection, feat: &Feature| match key {
        SplitKey::Func(f) => vec![f(data, feat)],
        _ => indices
            .iter()
            .map(|&i| feat.value(i).cloned().unwrap_or(Value::Null))
            .collect(),
    })
}

fn break_class(v: f64, breaks: &[f64]) -> usize {
    breaks.iter().position(|&b| v <= b).unwrap_or(breaks.len())
}

/// Split a collection into groups by a key.
///
/// Yields `(group_key, collection)` pairs lazily, each output sharing the
/// input schema. Group enumeration follows first-encounter order; with
/// numeric breaks the group key is the class index as an `Int`.
///
/// # Errors
///
/// `InvalidInput` for an unknown field name.
pub fn split<'a>(
    data: &'a FeatureCollection,
    key: &'a SplitKey<'a>,
    breaks: GroupBreaks,
) -> Result<impl Iterator<Item = (Vec<Value>, FeatureCollection)> + 'a> {
    let keyer = key_fn(data, key)?;
    let group_of = move |feat: &Feature| -> Option<Vec<Value>> {
        let raw = keyer(data, feat);
        match &breaks {
            GroupBreaks::Unique => Some(raw),
            GroupBreaks::Breaks(b) => {
                let v = raw.first().and_then(Value::as_f64)?;
                Some(vec![Value::Int(break_class(v, b) as i64)])
            }
        }
    };

    // one scan to enumerate groups in first-encounter order
    let mut seen = FxHashSet::default();
    let mut order: Vec<Vec<Value>> = Vec::new();
    for feat in data.features() {
        if let Some(g) = group_of(feat) {
            if seen.insert(g.clone()) {
                order.push(g);
            }
        }
    }
    log::debug!("split into {} groups", order.len());

    Ok(order.into_iter().map(move |group| {
        let mut out = data.like();
        for feat in data.features() {
            if group_of(feat).as_ref() == Some(&group) {
                out.push(feat.row().to_vec(), feat.geometry().cloned());
            }
        }
        (group, out)
    }))
}

/// Merge collections into one with the union of their field schemas.
///
/// Fields keep first-seen order; rows are copied into the union schema with
/// unmatched cells filled with `Value::Null`; geometries are copied as-is.
///
/// # Errors
///
/// `EmptyInput` when no collections are given.
pub fn merge(datasets: &[&FeatureCollection]) -> Result<FeatureCollection> {
    if datasets.is_empty() {
        return Err(KartaError::EmptyInput("merge"));
    }

    let mut fields: Vec<String> = Vec::new();
    for data in datasets {
        for name in data.fields() {
            if !fields.contains(name) {
                fields.push(name.clone());
            }
        }
    }

    let mut out = FeatureCollection::new(fields)?;
    for data in datasets {
        let mapping: Vec<Option<usize>> = out
            .fields()
            .iter()
            .map(|name| data.field_index(name))
            .collect();
        for feat in data.features() {
            let row: Vec<Value> = mapping
                .iter()
                .map(|slot| {
                    slot.and_then(|i| feat.value(i).cloned())
                        .unwrap_or(Value::Null)
                })
                .collect();
            out.push(row, feat.geometry().cloned());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};

    fn cities() -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["name", "country", "pop"]).unwrap();
        let rows: [(&str, &str, i64); 4] = [
            ("oslo", "no", 700_000),
            ("bergen", "no", 280_000),
            ("malmo", "se", 350_000),
            ("umea", "se", 90_000),
        ];
        for (i, (name, country, pop)) in rows.iter().enumerate() {
            data.add_feature(
                vec![Value::from(*name), Value::from(*country), Value::from(*pop)],
                Some(Geometry::Point(Point::new(i as f64, 0.0))),
            )
            .unwrap();
        }
        data
    }

    #[test]
    fn test_split_unique_first_encounter_order() {
        let data = cities();
        let key = SplitKey::Field("country");
        let groups: Vec<_> = split(&data, &key, GroupBreaks::Unique).unwrap().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, vec![Value::from("no")]);
        assert_eq!(groups[1].0, vec![Value::from("se")]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1.fields(), data.fields());
    }

    #[test]
    fn test_split_multi_field_key() {
        let data = cities();
        let names = ["country", "name"];
        let key = SplitKey::Fields(&names);
        let groups: Vec<_> = split(&data, &key, GroupBreaks::Unique).unwrap().collect();
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_split_numeric_breaks() {
        let data = cities();
        let key = SplitKey::Field("pop");
        let groups: Vec<_> = split(&data, &key, GroupBreaks::Breaks(vec![100_000.0, 300_000.0]))
            .unwrap()
            .collect();
        // encounter order: oslo above all breaks (2), bergen mid (1), umea low (0)
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0, vec![Value::Int(2)]);
        assert_eq!(groups[1].0, vec![Value::Int(1)]);
        assert_eq!(groups[2].0, vec![Value::Int(0)]);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_split_unknown_field() {
        let data = cities();
        let key = SplitKey::Field("nope");
        assert!(matches!(
            split(&data, &key, GroupBreaks::Unique).map(|it| it.count()),
            Err(KartaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_split_by_function() {
        let data = cities();
        let func = |data: &FeatureCollection, feat: &Feature| {
            let big = data
                .value(feat, "pop")
                .and_then(Value::as_f64)
                .is_some_and(|p| p > 300_000.0);
            Value::from(big)
        };
        let key = SplitKey::Func(&func);
        let groups: Vec<_> = split(&data, &key, GroupBreaks::Unique).unwrap().collect();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_merge_unions_fields_and_fills_null() {
        let a = cities();
        let mut b = FeatureCollection::new(vec!["name", "elevation"]).unwrap();
        b.add_feature(
            vec![Value::from("tromso"), Value::from(10.0)],
            Some(Geometry::Point(Point::new(9.0, 9.0))),
        )
        .unwrap();

        let merged = merge(&[&a, &b]).unwrap();
        assert_eq!(
            merged.fields(),
            ["name", "country", "pop", "elevation"]
        );
        assert_eq!(merged.len(), 5);

        // a-rows have null elevation, b-rows null country/pop
        let first = &merged.features()[0];
        assert_eq!(merged.value(first, "elevation"), Some(&Value::Null));
        let last = &merged.features()[4];
        assert_eq!(merged.value(last, "country"), Some(&Value::Null));
        assert_eq!(merged.value(last, "name"), Some(&Value::from("tromso")));
    }

    #[test]
    fn test_merge_empty_input() {
        assert!(matches!(merge(&[]), Err(KartaError::EmptyInput("merge"))));
    }
}
