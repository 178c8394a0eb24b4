//! Text summary of a colored parcel layer, drawn through a tallying renderer.

use std::collections::BTreeMap;
use std::fmt;

use layers::{
    AttributeSpec, ColorMode, FALLBACK_COLOR, FeatureStyler, HOT_BREAK, LayerId, LayerStyle,
    ParcelLayer, RenderAdapter, Rgba, SELECTED_COLOR, UNSELECTED_ALPHA, WARM_BREAK, gradient,
};
use streaming::{Feature, FeatureCollection};

#[derive(Debug, Clone, PartialEq)]
pub struct LegendRow {
    pub label: String,
    pub color: Rgba,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub attribute: AttributeSpec,
    pub features: usize,
    pub selected: usize,
    pub fallback: usize,
    pub rows: Vec<LegendRow>,
    pub max_elevation: Option<f64>,
}

#[derive(Default)]
struct TallyRenderer {
    colors: Vec<Rgba>,
    max_elevation: Option<f64>,
}

impl RenderAdapter for TallyRenderer {
    fn render(
        &mut self,
        _layer: LayerId,
        features: &FeatureCollection,
        _style: &LayerStyle,
        styler: &dyn FeatureStyler,
        _on_click: &mut dyn FnMut(&Feature),
    ) {
        for feature in &features.features {
            self.colors.push(styler.fill_color(feature));
            if let Some(h) = styler.elevation(feature) {
                self.max_elevation = Some(self.max_elevation.map_or(h, |m| m.max(h)));
            }
        }
    }
}

pub fn summarize(layer: &mut ParcelLayer) -> LayerSummary {
    let mut tally = TallyRenderer::default();
    layer.draw(&mut tally);

    let key = layer.attribute().to_string();
    let selection = layer.selection().clone();
    let styler = layer.symbology_mut().styler(&key, &selection, false);
    let attribute = styler.attribute().clone();
    let dataset = layer.symbology_mut().dataset().clone();

    let rows = match attribute.mode {
        ColorMode::Continuous { domain } => {
            let bands = [
                ("low", 0.0),
                ("high", WARM_BREAK),
                ("outlier", HOT_BREAK),
            ];
            let mut counts = [0usize; 3];
            for value in dataset.features.iter().filter_map(|f| f.number(&key)) {
                let t = domain.log_position(value);
                let band = if t < WARM_BREAK {
                    0
                } else if t < HOT_BREAK {
                    1
                } else {
                    2
                };
                counts[band] += 1;
            }
            bands
                .iter()
                .zip(counts)
                .map(|((label, t), count)| {
                    let [r, g, b] = gradient(*t);
                    LegendRow {
                        label: (*label).to_string(),
                        color: [r, g, b, UNSELECTED_ALPHA],
                        count,
                    }
                })
                .collect()
        }
        ColorMode::Categorical => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in dataset.features.iter().filter_map(|f| f.category(&key)) {
                *counts.entry(value).or_default() += 1;
            }
            styler
                .palette()
                .map(|palette| {
                    palette
                        .entries()
                        .map(|(value, color)| LegendRow {
                            label: value.to_string(),
                            color,
                            count: counts.get(value).copied().unwrap_or(0),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }
    };

    LayerSummary {
        attribute,
        features: tally.colors.len(),
        selected: tally.colors.iter().filter(|c| **c == SELECTED_COLOR).count(),
        fallback: tally.colors.iter().filter(|c| **c == FALLBACK_COLOR).count(),
        rows,
        max_elevation: tally.max_elevation,
    }
}

impl LayerSummary {
    pub fn display(&self, max_rows: usize) -> SummaryDisplay<'_> {
        SummaryDisplay {
            summary: self,
            max_rows,
        }
    }
}

pub struct SummaryDisplay<'a> {
    summary: &'a LayerSummary,
    max_rows: usize,
}

impl fmt::Display for SummaryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        writeln!(f, "{} ({}): {} parcels", s.attribute.label, s.attribute.key, s.features)?;
        for row in s.rows.iter().take(self.max_rows) {
            let [r, g, b, a] = row.color;
            writeln!(f, "  #{r:02x}{g:02x}{b:02x}{a:02x}  {:>8}  {}", row.count, row.label)?;
        }
        if s.rows.len() > self.max_rows {
            writeln!(f, "  ... {} more", s.rows.len() - self.max_rows)?;
        }
        writeln!(f, "  no value: {}", s.fallback)?;
        writeln!(f, "  selected: {}", s.selected)?;
        if let Some(h) = s.max_elevation {
            writeln!(f, "  max elevation: {h:.1}")?;
        }
        Ok(())
    }
}
