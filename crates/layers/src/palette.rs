//! Categorical color mode: one golden-angle hue per distinct value.
//!
//! Distinct values are enumerated in sorted order, so the assignment depends
//! only on the set of values present and never on discovery order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use streaming::FeatureCollection;
use tracing::debug;

use crate::symbology::{Rgba, UNSELECTED_ALPHA};

/// Hue step between consecutive category indices, in degrees.
pub const GOLDEN_ANGLE_DEG: f64 = 137.5;
pub const PALETTE_SATURATION: f64 = 70.0;
pub const PALETTE_LIGHTNESS: f64 = 50.0;

/// HSL (hue in degrees, saturation and lightness in percent) to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [u8; 3] {
    let s = s / 100.0;
    let l = l / 100.0;
    let a = s * l.min(1.0 - l);
    let f = |n: f64| {
        let k = (n + h / 30.0) % 12.0;
        let v = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
        (255.0 * v).round().clamp(0.0, 255.0) as u8
    };
    [f(0.0), f(8.0), f(4.0)]
}

/// Color of the `index`-th distinct category.
pub fn category_color(index: usize) -> Rgba {
    let hue = (index as f64 * GOLDEN_ANGLE_DEG) % 360.0;
    let [r, g, b] = hsl_to_rgb(hue, PALETTE_SATURATION, PALETTE_LIGHTNESS);
    [r, g, b, UNSELECTED_ALPHA]
}

/// Value → color assignment for one categorical attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPalette {
    colors: BTreeMap<String, Rgba>,
}

impl CategoryPalette {
    /// Collects the distinct values of `key` across the dataset. Features
    /// without a value for `key` do not get a palette entry.
    pub fn build(features: &FeatureCollection, key: &str) -> Self {
        Self::from_values(features.features.iter().filter_map(|f| f.category(key)))
    }

    pub fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let distinct: BTreeSet<String> = values.into_iter().collect();
        let colors = distinct
            .into_iter()
            .enumerate()
            .map(|(i, value)| (value, category_color(i)))
            .collect();
        Self { colors }
    }

    pub fn color(&self, value: &str) -> Option<Rgba> {
        self.colors.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Legend entries in value order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Rgba)> + '_ {
        self.colors.iter().map(|(k, c)| (k.as_str(), *c))
    }
}

/// Palettes derived for the current dataset, one per attribute key.
///
/// A palette is built the first time its attribute is selected and reused
/// afterwards. [`PaletteCache::invalidate`] must be called when the dataset
/// changes.
#[derive(Debug, Default)]
pub struct PaletteCache {
    palettes: HashMap<String, Arc<CategoryPalette>>,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, features: &FeatureCollection, key: &str) -> Arc<CategoryPalette> {
        if let Some(p) = self.palettes.get(key) {
            return Arc::clone(p);
        }
        let palette = Arc::new(CategoryPalette::build(features, key));
        debug!("built palette for {key}: {} categories", palette.len());
        self.palettes.insert(key.to_string(), Arc::clone(&palette));
        palette
    }

    pub fn invalidate(&mut self) {
        self.palettes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Geometry, Value as GeoValue};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::collections::HashSet;
    use streaming::Feature;

    fn feature(id: &str, nbh: Option<&str>) -> Feature {
        let mut props = Map::new();
        if let Some(nbh) = nbh {
            props.insert("nbhname".into(), json!(nbh));
        }
        let ring = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        Feature::new(id, Geometry::new(GeoValue::MultiPolygon(vec![vec![ring]])), props)
    }

    #[test]
    fn hsl_matches_reference_values() {
        assert_eq!(hsl_to_rgb(0.0, 70.0, 50.0), [217, 38, 38]);
        assert_eq!(hsl_to_rgb(120.0, 70.0, 50.0), [38, 217, 38]);
        assert_eq!(hsl_to_rgb(240.0, 70.0, 50.0), [38, 38, 217]);
        assert_eq!(hsl_to_rgb(0.0, 0.0, 100.0), [255, 255, 255]);
    }

    #[test]
    fn first_category_is_red() {
        assert_eq!(category_color(0), [217, 38, 38, 200]);
    }

    #[test]
    fn assignment_ignores_discovery_order() {
        let a = CategoryPalette::from_values(["R1", "C2", "I1"].map(String::from));
        let b = CategoryPalette::from_values(["I1", "R1", "C2", "R1"].map(String::from));
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        let order: Vec<&str> = a.entries().map(|(v, _)| v).collect();
        assert_eq!(order, vec!["C2", "I1", "R1"]);
        assert_eq!(a.color("C2"), Some(category_color(0)));
    }

    #[test]
    fn rebuilding_is_stable() {
        let fc = FeatureCollection::new(vec![
            feature("1", Some("Southside")),
            feature("2", Some("Avondale")),
            feature("3", None),
            feature("4", Some("Southside")),
        ]);
        let first = CategoryPalette::build(&fc, "nbhname");
        let second = CategoryPalette::build(&fc, "nbhname");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.color("unseen"), None);
    }

    #[test]
    fn golden_angle_keeps_colors_distinct() {
        // 137.5° revisits a hue only after 144 steps.
        let colors: HashSet<Rgba> = (0..144).map(category_color).collect();
        assert_eq!(colors.len(), 144);
    }

    #[test]
    fn cache_builds_once_until_invalidated() {
        let fc = FeatureCollection::new(vec![feature("1", Some("Southside"))]);
        let mut cache = PaletteCache::new();
        let p1 = cache.get_or_build(&fc, "nbhname");
        assert_eq!(p1.len(), 1);

        let changed = FeatureCollection::new(vec![
            feature("1", Some("Southside")),
            feature("2", Some("Avondale")),
        ]);
        let p2 = cache.get_or_build(&changed, "nbhname");
        assert!(Arc::ptr_eq(&p1, &p2));

        cache.invalidate();
        let p3 = cache.get_or_build(&changed, "nbhname");
        assert_eq!(p3.len(), 2);
    }
}
