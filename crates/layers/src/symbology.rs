//! Per-feature fill color and elevation for the parcel layer.
//!
//! Color computation is a pure function of the feature, the selected
//! attribute, the selection and the attribute's palette. Nothing is carried
//! from one feature to the next, so a styler can be rebuilt from scratch
//! whenever the attribute, the selection or the dataset changes.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streaming::{Feature, FeatureCollection};

use crate::palette::{CategoryPalette, PaletteCache};
use crate::ramp::{ValueDomain, elevation, ramp_color};

pub type Rgba = [u8; 4];

pub const UNSELECTED_ALPHA: u8 = 200;
/// Fill of the selected parcel(s), overriding every mode.
pub const SELECTED_COLOR: Rgba = [255, 255, 255, 255];
/// Fill of a parcel with no usable value for the selected attribute.
pub const FALLBACK_COLOR: Rgba = [150, 150, 150, 150];

/// Attribute colored with the continuous ramp by default.
pub const VALUE_PER_ACRE: &str = "valueperacre";

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    pub stroked: bool,
    pub filled: bool,
    pub line_color: Rgba,
    pub line_width_min_pixels: f32,
    /// Hover highlight applied by the renderer.
    pub highlight_color: Rgba,
    /// Draw parcels as 3D columns using [`FeatureStyler::elevation`].
    pub extruded: bool,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            stroked: true,
            filled: true,
            line_color: [0, 0, 0, 255],
            line_width_min_pixels: 1.0,
            highlight_color: [200, 200, 255, 255],
            extruded: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorMode {
    Continuous { domain: ValueDomain },
    Categorical,
}

/// An attribute the map can be colored by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub key: String,
    pub label: String,
    pub mode: ColorMode,
}

impl AttributeSpec {
    pub fn continuous(key: impl Into<String>, label: impl Into<String>, domain: ValueDomain) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            mode: ColorMode::Continuous { domain },
        }
    }

    pub fn categorical(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            mode: ColorMode::Categorical,
        }
    }

    /// The attributes offered by the parcel map.
    pub fn catalog() -> Vec<AttributeSpec> {
        vec![
            Self::continuous(VALUE_PER_ACRE, "Value per Acre", ValueDomain::default()),
            Self::categorical("nbhname", "Neighborhood"),
            Self::categorical("cls", "Zoning Class"),
        ]
    }
}

/// Currently selected parcel id(s).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    One(String),
    Many(BTreeSet<String>),
}

impl Selection {
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Selection::None => false,
            Selection::One(selected) => selected == id,
            Selection::Many(ids) => ids.contains(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Selection::None => true,
            Selection::One(_) => false,
            Selection::Many(ids) => ids.is_empty(),
        }
    }

    /// Click handling: selects `id` alone, or clears it if it already was the
    /// only selection.
    pub fn toggle(&self, id: &str) -> Selection {
        match self {
            Selection::One(selected) if selected == id => Selection::None,
            _ => Selection::One(id.to_string()),
        }
    }
}

/// Inputs of the fill color, passed in full on every call.
#[derive(Debug, Clone, Copy)]
pub struct ColorInputs<'a> {
    pub attribute: &'a AttributeSpec,
    pub selection: &'a Selection,
    /// Palette for `attribute`; unused in continuous mode.
    pub palette: Option<&'a CategoryPalette>,
}

pub fn fill_color(feature: &Feature, inputs: ColorInputs<'_>) -> Rgba {
    if inputs.selection.contains(&feature.id) {
        return SELECTED_COLOR;
    }

    let key = inputs.attribute.key.as_str();
    match inputs.attribute.mode {
        ColorMode::Continuous { domain } => feature
            .number(key)
            .map_or(FALLBACK_COLOR, |v| ramp_color(v, &domain)),
        ColorMode::Categorical => feature
            .category(key)
            .and_then(|value| inputs.palette?.color(&value))
            .unwrap_or(FALLBACK_COLOR),
    }
}

/// The per-feature functions handed to a renderer.
pub trait FeatureStyler {
    fn fill_color(&self, feature: &Feature) -> Rgba;

    /// Extrusion height, or `None` when drawing flat.
    fn elevation(&self, feature: &Feature) -> Option<f64>;
}

/// Styler for one `(attribute, selection, palette)` state.
#[derive(Debug, Clone)]
pub struct ParcelStyler {
    attribute: AttributeSpec,
    selection: Selection,
    palette: Option<Arc<CategoryPalette>>,
    extruded: bool,
}

impl ParcelStyler {
    pub fn attribute(&self) -> &AttributeSpec {
        &self.attribute
    }

    pub fn palette(&self) -> Option<&CategoryPalette> {
        self.palette.as_deref()
    }
}

impl FeatureStyler for ParcelStyler {
    fn fill_color(&self, feature: &Feature) -> Rgba {
        fill_color(
            feature,
            ColorInputs {
                attribute: &self.attribute,
                selection: &self.selection,
                palette: self.palette.as_deref(),
            },
        )
    }

    fn elevation(&self, feature: &Feature) -> Option<f64> {
        if !self.extruded {
            return None;
        }
        // Height always follows the raw value per acre, whatever the color attribute.
        Some(feature.number(VALUE_PER_ACRE).map_or(0.0, elevation))
    }
}

/// Color mapping session over one assembled dataset.
///
/// Holds the attribute catalog and the palette cache; replacing the dataset
/// invalidates every cached palette.
#[derive(Debug)]
pub struct Symbology {
    attributes: Vec<AttributeSpec>,
    dataset: Arc<FeatureCollection>,
    palettes: PaletteCache,
}

impl Symbology {
    pub fn new(attributes: Vec<AttributeSpec>, dataset: Arc<FeatureCollection>) -> Self {
        Self {
            attributes,
            dataset,
            palettes: PaletteCache::new(),
        }
    }

    pub fn dataset(&self) -> &Arc<FeatureCollection> {
        &self.dataset
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn set_dataset(&mut self, dataset: Arc<FeatureCollection>) {
        if !Arc::ptr_eq(&self.dataset, &dataset) {
            self.palettes.invalidate();
        }
        self.dataset = dataset;
    }

    /// Catalog entry for `key`; keys outside the catalog are categorical.
    pub fn attribute(&self, key: &str) -> AttributeSpec {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .cloned()
            .unwrap_or_else(|| AttributeSpec::categorical(key, key))
    }

    pub fn styler(&mut self, key: &str, selection: &Selection, extruded: bool) -> ParcelStyler {
        let attribute = self.attribute(key);
        let palette = match attribute.mode {
            ColorMode::Categorical => Some(self.palettes.get_or_build(&self.dataset, key)),
            ColorMode::Continuous { .. } => None,
        };
        ParcelStyler {
            attribute,
            selection: selection.clone(),
            palette,
            extruded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Geometry, Value as GeoValue};
    use serde_json::{Map, Value, json};

    fn parcel(id: &str, props: Value) -> Feature {
        let Value::Object(map) = props else {
            panic!("props must be an object");
        };
        let ring = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        Feature::new(id, Geometry::new(GeoValue::MultiPolygon(vec![vec![ring]])), map)
    }

    fn dataset() -> Arc<FeatureCollection> {
        Arc::new(FeatureCollection::new(vec![
            parcel("A", json!({"valueperacre": 0.0, "nbhname": "Avondale", "cls": "R1"})),
            parcel("B", json!({"valueperacre": 18_270_386.920_980_927, "nbhname": "Southside"})),
            parcel("C", json!({"valueperacre": null, "nbhname": null})),
        ]))
    }

    #[test]
    fn continuous_mode_uses_ramp() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        let styler = s.styler(VALUE_PER_ACRE, &Selection::None, false);
        let d = s.dataset().clone();
        assert_eq!(styler.fill_color(&d.features[0]), [0, 255, 0, 200]);
        assert_eq!(styler.fill_color(&d.features[1]), [255, 0, 255, 200]);
        assert_eq!(styler.fill_color(&d.features[2]), FALLBACK_COLOR);
        assert!(styler.palette().is_none());
    }

    #[test]
    fn categorical_mode_uses_palette_and_falls_back_to_gray() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        let styler = s.styler("nbhname", &Selection::None, false);
        let d = s.dataset().clone();
        let palette = styler.palette().expect("palette");
        assert_eq!(palette.len(), 2);
        assert_eq!(
            styler.fill_color(&d.features[0]),
            palette.color("Avondale").expect("color")
        );
        assert_eq!(styler.fill_color(&d.features[2]), FALLBACK_COLOR);

        // A value absent from the palette renders gray, never an error.
        let stranger = parcel("Z", json!({"nbhname": "Nowhere"}));
        assert_eq!(styler.fill_color(&stranger), FALLBACK_COLOR);
    }

    #[test]
    fn selection_overrides_every_mode() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        let selected = Selection::One("B".to_string());
        let d = s.dataset().clone();
        for key in [VALUE_PER_ACRE, "nbhname", "cls", "ownername"] {
            let styler = s.styler(key, &selected, true);
            assert_eq!(styler.fill_color(&d.features[1]), SELECTED_COLOR, "{key}");
            assert_ne!(styler.fill_color(&d.features[0]), SELECTED_COLOR, "{key}");
        }

        let many = Selection::Many(["A", "C"].iter().map(|id| id.to_string()).collect());
        let styler = s.styler("nbhname", &many, false);
        assert_eq!(styler.fill_color(&d.features[0]), SELECTED_COLOR);
        assert_eq!(styler.fill_color(&d.features[2]), SELECTED_COLOR);
    }

    #[test]
    fn selection_toggle() {
        let s = Selection::None.toggle("A");
        assert_eq!(s, Selection::One("A".to_string()));
        assert_eq!(s.toggle("B"), Selection::One("B".to_string()));
        assert!(s.toggle("A").is_empty());
    }

    #[test]
    fn color_is_independent_of_call_order() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        let styler = s.styler("nbhname", &Selection::One("A".into()), false);
        let d = s.dataset().clone();
        let forward: Vec<Rgba> = d.features.iter().map(|f| styler.fill_color(f)).collect();
        let mut backward: Vec<Rgba> = d.features.iter().rev().map(|f| styler.fill_color(f)).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn elevation_follows_raw_value_when_extruded() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        let d = s.dataset().clone();
        let flat = s.styler("nbhname", &Selection::None, false);
        assert_eq!(flat.elevation(&d.features[1]), None);

        let tall = s.styler("nbhname", &Selection::None, true);
        let h = tall.elevation(&d.features[1]).expect("height");
        assert!((h - 18_270_386.920_980_927 * 0.00055).abs() < 1e-6);
        assert_eq!(tall.elevation(&d.features[2]), Some(0.0));
    }

    #[test]
    fn replacing_dataset_invalidates_palettes() {
        let mut s = Symbology::new(AttributeSpec::catalog(), dataset());
        assert_eq!(s.styler("nbhname", &Selection::None, false).palette().map(|p| p.len()), Some(2));

        let mut props = Map::new();
        props.insert("nbhname".into(), json!("Woodlawn"));
        let mut grown = (*dataset()).clone();
        grown.features.push(parcel("D", Value::Object(props)));
        s.set_dataset(Arc::new(grown));

        assert_eq!(s.styler("nbhname", &Selection::None, false).palette().map(|p| p.len()), Some(3));
    }

    #[test]
    fn unknown_keys_are_categorical() {
        let s = Symbology::new(AttributeSpec::catalog(), dataset());
        assert_eq!(s.attribute("ownername").mode, ColorMode::Categorical);
        assert!(matches!(
            s.attribute(VALUE_PER_ACRE).mode,
            ColorMode::Continuous { .. }
        ));
    }
}
