use streaming::{Feature, FeatureCollection};

use crate::symbology::{FeatureStyler, LayerStyle, Selection, Symbology, VALUE_PER_ACRE};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Boundary to the external geometry renderer.
///
/// The renderer receives the collection, the layer presentation and the pure
/// per-feature styling functions. It reports picked features through
/// `on_click` and must not retain any of the arguments after returning.
pub trait RenderAdapter {
    fn render(
        &mut self,
        layer: LayerId,
        features: &FeatureCollection,
        style: &LayerStyle,
        styler: &dyn FeatureStyler,
        on_click: &mut dyn FnMut(&Feature),
    );
}

/// The parcel map layer: dataset, color attribute and selection.
#[derive(Debug)]
pub struct ParcelLayer {
    id: LayerId,
    symbology: Symbology,
    attribute: String,
    selection: Selection,
    style: LayerStyle,
}

impl ParcelLayer {
    pub fn new(id: u64, symbology: Symbology) -> Self {
        Self {
            id: LayerId(id),
            symbology,
            attribute: VALUE_PER_ACRE.to_string(),
            selection: Selection::None,
            style: LayerStyle::default(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }

    pub fn symbology_mut(&mut self) -> &mut Symbology {
        &mut self.symbology
    }

    pub fn set_attribute(&mut self, key: impl Into<String>) {
        self.attribute = key.into();
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn set_extruded(&mut self, extruded: bool) {
        self.style.extruded = extruded;
    }

    pub fn click(&mut self, feature_id: &str) {
        self.selection = self.selection.toggle(feature_id);
    }

    /// Draws the layer with styling derived from the current state. Clicks
    /// reported during the draw update the selection afterwards.
    pub fn draw(&mut self, adapter: &mut dyn RenderAdapter) {
        let styler = self
            .symbology
            .styler(&self.attribute, &self.selection, self.style.extruded);
        let dataset = self.symbology.dataset().clone();

        let mut clicked: Vec<String> = Vec::new();
        adapter.render(self.id, &dataset, &self.style, &styler, &mut |f: &Feature| {
            clicked.push(f.id.clone())
        });

        for id in clicked {
            self.click(&id);
        }
    }
}
