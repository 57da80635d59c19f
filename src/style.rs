//! Style attributes: constants or dataset-classified per-feature values.
//!
//! Classification is dataset-global and expensive, so a classifier computes
//! its full feature-to-symbol table on first resolution and memoizes it by
//! feature identity. The memo has no staleness detection; callers own
//! invalidation when the backing dataset mutates.

use crate::collection::FeatureCollection;
use crate::feature::Feature;
use crate::types::{Color, FeatureId, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;

/// How a classifier partitions key values into classes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyMode {
    /// One class per distinct value, in first-encounter order.
    Unique,
    /// `n` quantile classes over the numeric values.
    Quantiles(usize),
    /// Classes bounded by explicit break values, class `i` holding values
    /// `<= breaks[i]`.
    Breaks(Vec<f64>),
}

/// Maps a field's values to symbols through a classification of the whole
/// dataset.
///
/// `Unique` cycles the symbol list when classes outnumber symbols; the
/// ordered modes clamp to the last symbol. Features whose key value does
/// not classify (null, or non-numeric under an ordered mode) get no entry
/// and resolve to `None`.
pub struct Classifier<T> {
    field: String,
    mode: ClassifyMode,
    symbols: Vec<T>,
    memo: RefCell<Option<FxHashMap<FeatureId, T>>>,
}

impl<T: Clone> Classifier<T> {
    pub fn new(field: impl Into<String>, mode: ClassifyMode, symbols: Vec<T>) -> Self {
        Self {
            field: field.into(),
            mode,
            symbols,
            memo: RefCell::new(None),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Drop the memo table; the next resolution reclassifies the dataset.
    pub fn invalidate(&self) {
        *self.memo.borrow_mut() = None;
    }

    /// Symbol for one feature, classifying the whole dataset on first call.
    pub fn resolve(&self, data: &FeatureCollection, feature: &Feature) -> Option<T> {
        let mut memo = self.memo.borrow_mut();
        let table = memo.get_or_insert_with(|| self.classify(data));
        table.get(&feature.id()).cloned()
    }

    fn symbol_cycled(&self, class: usize) -> Option<T> {
        (!self.symbols.is_empty()).then(|| self.symbols[class % self.symbols.len()].clone())
    }

    fn symbol_clamped(&self, class: usize) -> Option<T> {
        self.symbols.last().map(|last| {
            self.symbols.get(class).cloned().unwrap_or_else(|| last.clone())
        })
    }

    fn classify(&self, data: &FeatureCollection) -> FxHashMap<FeatureId, T> {
        log::debug!(
            "classifying {} features on field '{}'",
            data.len(),
            self.field
        );
        let mut table = FxHashMap::default();
        let Some(field) = data.field_index(&self.field) else {
            return table;
        };
        let keyed: Vec<(FeatureId, &Value)> = data
            .features()
            .iter()
            .filter_map(|f| f.value(field).map(|v| (f.id(), v)))
            .filter(|(_, v)| !v.is_null())
            .collect();

        match &self.mode {
            ClassifyMode::Unique => {
                let mut seen = FxHashSet::default();
                let mut order: Vec<&Value> = Vec::new();
                for (_, v) in &keyed {
                    if seen.insert((*v).clone()) {
                        order.push(*v);
                    }
                }
                for (id, v) in &keyed {
                    let class = order.iter().position(|o| o == v);
                    if let Some(symbol) = class.and_then(|c| self.symbol_cycled(c)) {
                        table.insert(*id, symbol);
                    }
                }
            }
            ClassifyMode::Quantiles(n) => {
                let mut values: Vec<f64> =
                    keyed.iter().filter_map(|(_, v)| v.as_f64()).collect();
                if values.is_empty() || *n == 0 {
                    return table;
                }
                values.sort_by(f64::total_cmp);
                let breaks: Vec<f64> = (1..*n)
                    .map(|i| {
                        let pos = (i * values.len()) / n;
                        values[pos.min(values.len() - 1)]
                    })
                    .collect();
                for (id, v) in &keyed {
                    let Some(v) = v.as_f64() else { continue };
                    let class = break_class(v, &breaks);
                    if let Some(symbol) = self.symbol_clamped(class) {
                        table.insert(*id, symbol);
                    }
                }
            }
            ClassifyMode::Breaks(breaks) => {
                for (id, v) in &keyed {
                    let Some(v) = v.as_f64() else { continue };
                    let class = break_class(v, breaks);
                    if let Some(symbol) = self.symbol_clamped(class) {
                        table.insert(*id, symbol);
                    }
                }
            }
        }
        table
    }
}

fn break_class(v: f64, breaks: &[f64]) -> usize {
    breaks.iter().position(|&b| v <= b).unwrap_or(breaks.len())
}

/// One style attribute: the same value for every feature, or classified
/// per feature.
pub enum StyleProp<T> {
    Constant(T),
    Classified(Classifier<T>),
}

impl<T: Clone> StyleProp<T> {
    /// Per-feature value; `None` when a classifier has no entry for the
    /// feature.
    pub fn resolve(&self, data: &FeatureCollection, feature: &Feature) -> Option<T> {
        match self {
            StyleProp::Constant(v) => Some(v.clone()),
            StyleProp::Classified(c) => c.resolve(data, feature),
        }
    }

    /// Invalidate the classifier memo, if this is a classified attribute.
    pub fn invalidate(&self) {
        if let StyleProp::Classified(c) = self {
            c.invalidate();
        }
    }
}

/// Sort direction for the render-order field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Full style configuration of a vector layer.
pub struct StyleOptions {
    pub fill_color: StyleProp<Color>,
    /// Point radius in pixels; ignored for lines and polygons.
    pub fill_size: StyleProp<f64>,
    pub outline_color: StyleProp<Color>,
    pub outline_width: StyleProp<f64>,
    /// Draw order within the layer; none keeps collection order.
    pub sort_field: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            fill_color: StyleProp::Constant(Color::rgb(100, 149, 237)),
            fill_size: StyleProp::Constant(4.0),
            outline_color: StyleProp::Constant(Color::BLACK),
            outline_width: StyleProp::Constant(1.0),
            sort_field: None,
            sort_order: SortOrder::default(),
        }
    }
}

impl StyleOptions {
    /// Invalidate every classified attribute; call after mutating the
    /// layer's dataset.
    pub fn invalidate(&self) {
        self.fill_color.invalidate();
        self.fill_size.invalidate();
        self.outline_color.invalidate();
        self.outline_width.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};

    fn sized(values: &[i64]) -> FeatureCollection {
        let mut data = FeatureCollection::new(vec!["v"]).unwrap();
        for (i, v) in values.iter().enumerate() {
            data.add_feature(
                vec![Value::from(*v)],
                Some(Geometry::Point(Point::new(i as f64, 0.0))),
            )
            .unwrap();
        }
        data
    }

    #[test]
    fn test_unique_classes_in_first_encounter_order() {
        let data = sized(&[7, 3, 7, 9]);
        let classifier = Classifier::new("v", ClassifyMode::Unique, vec!["a", "b", "c"]);
        let feats = data.features();
        assert_eq!(classifier.resolve(&data, &feats[0]), Some("a"));
        assert_eq!(classifier.resolve(&data, &feats[1]), Some("b"));
        assert_eq!(classifier.resolve(&data, &feats[2]), Some("a"));
        assert_eq!(classifier.resolve(&data, &feats[3]), Some("c"));
    }

    #[test]
    fn test_unique_symbols_cycle() {
        let data = sized(&[1, 2, 3]);
        let classifier = Classifier::new("v", ClassifyMode::Unique, vec!["x", "y"]);
        let feats = data.features();
        assert_eq!(classifier.resolve(&data, &feats[2]), Some("x"));
    }

    #[test]
    fn test_breaks_classification() {
        let data = sized(&[5, 50, 500]);
        let classifier = Classifier::new(
            "v",
            ClassifyMode::Breaks(vec![10.0, 100.0]),
            vec![1.0, 2.0, 3.0],
        );
        let feats = data.features();
        assert_eq!(classifier.resolve(&data, &feats[0]), Some(1.0));
        assert_eq!(classifier.resolve(&data, &feats[1]), Some(2.0));
        assert_eq!(classifier.resolve(&data, &feats[2]), Some(3.0));
    }

    #[test]
    fn test_quantiles_split_evenly() {
        let data = sized(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let classifier = Classifier::new("v", ClassifyMode::Quantiles(2), vec!["low", "high"]);
        let feats = data.features();
        assert_eq!(classifier.resolve(&data, &feats[0]), Some("low"));
        assert_eq!(classifier.resolve(&data, &feats[7]), Some("high"));
    }

    #[test]
    fn test_memo_keyed_on_identity_not_content() {
        let mut data = FeatureCollection::new(vec!["v"]).unwrap();
        // two structurally identical features
        data.add_feature(vec![Value::from(1)], Some(Geometry::Point(Point::new(0.0, 0.0))))
            .unwrap();
        data.add_feature(vec![Value::from(1)], Some(Geometry::Point(Point::new(0.0, 0.0))))
            .unwrap();
        let classifier = Classifier::new("v", ClassifyMode::Unique, vec!["s"]);
        classifier.resolve(&data, &data.features()[0]);

        let memo = classifier.memo.borrow();
        let table = memo.as_ref().unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.contains_key(&data.features()[0].id()));
        assert!(table.contains_key(&data.features()[1].id()));
    }

    #[test]
    fn test_invalidate_reclassifies() {
        let mut data = sized(&[1, 2]);
        let classifier = Classifier::new("v", ClassifyMode::Unique, vec!["a", "b", "c"]);
        assert_eq!(classifier.resolve(&data, &data.features()[0]), Some("a"));

        data.add_feature(vec![Value::from(3)], Some(Geometry::Point(Point::new(9.0, 0.0))))
            .unwrap();
        // stale memo has no entry for the new feature
        assert_eq!(classifier.resolve(&data, &data.features()[2]), None);

        classifier.invalidate();
        assert_eq!(classifier.resolve(&data, &data.features()[2]), Some("c"));
    }

    #[test]
    fn test_null_values_resolve_to_none() {
        let mut data = FeatureCollection::new(vec!["v"]).unwrap();
        data.add_feature(vec![Value::Null], Some(Geometry::Point(Point::new(0.0, 0.0))))
            .unwrap();
        let classifier = Classifier::new("v", ClassifyMode::Unique, vec!["s"]);
        assert_eq!(classifier.resolve(&data, &data.features()[0]), None);
    }

    #[test]
    fn test_style_prop_constant_and_default_options() {
        let data = sized(&[1]);
        let prop = StyleProp::Constant(Color::WHITE);
        assert_eq!(prop.resolve(&data, &data.features()[0]), Some(Color::WHITE));

        let options = StyleOptions::default();
        assert!(options.sort_field.is_none());
        assert_eq!(options.sort_order, SortOrder::Ascending);
    }
}
