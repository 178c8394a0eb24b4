//! Turns a raw parcel GeoJSON export into store-ready features.
//!
//! Attribute keys are lower-cased, the parcel id comes from `parcelid`, and
//! `valueperacre` is derived from the assessed value and the GIS acreage when
//! the export does not carry it.

use std::collections::HashSet;

use geojson::JsonObject;
use layers::VALUE_PER_ACRE;
use serde_json::{Map, Value};
use streaming::{Feature, PARCEL_ID_KEY, normalize_geometry};
use tracing::warn;

pub const ASSESSED_VALUE_KEY: &str = "assdvalue";
pub const ACRES_KEY: &str = "gis_acres";

#[derive(Debug, Default)]
pub struct PreparedImport {
    pub parcels: Vec<Feature>,
    pub skipped: usize,
}

/// Features without a parcel id or a polygonal geometry are skipped, as are
/// repeats of an id already seen.
pub fn prepare_parcels(collection: geojson::FeatureCollection) -> PreparedImport {
    let mut out = PreparedImport::default();
    let mut seen = HashSet::new();

    for (index, raw) in collection.features.into_iter().enumerate() {
        let properties = normalize_properties(raw.properties.unwrap_or_default());

        let Some(id) = properties.get(PARCEL_ID_KEY).and_then(id_string) else {
            warn!("feature {index}: no {PARCEL_ID_KEY}, skipped");
            out.skipped += 1;
            continue;
        };
        if !seen.insert(id.clone()) {
            warn!("feature {index}: duplicate parcel {id}, skipped");
            out.skipped += 1;
            continue;
        }

        let Some(geometry) = raw.geometry else {
            warn!("parcel {id}: no geometry, skipped");
            out.skipped += 1;
            continue;
        };
        let geometry = match normalize_geometry(geometry) {
            Ok(g) => g,
            Err(err) => {
                warn!("parcel {id}: {err}, skipped");
                out.skipped += 1;
                continue;
            }
        };

        out.parcels.push(Feature::new(id, geometry, properties));
    }

    out
}

pub fn normalize_properties(raw: JsonObject) -> Map<String, Value> {
    let mut properties = Map::new();
    for (key, value) in raw {
        properties.entry(key.to_lowercase()).or_insert(value);
    }
    properties.remove("geometry");

    let has_value = properties
        .get(VALUE_PER_ACRE)
        .is_some_and(|v| !v.is_null());
    if !has_value {
        let assessed = properties.get(ASSESSED_VALUE_KEY).and_then(number);
        let acres = properties.get(ACRES_KEY).and_then(number);
        if let (Some(assessed), Some(acres)) = (assessed, acres)
            && acres > 0.0
            && let Some(vpa) = serde_json::Number::from_f64(assessed / acres)
        {
            properties.insert(VALUE_PER_ACRE.to_string(), Value::Number(vpa));
        }
    }

    properties
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|v: &f64| v.is_finite())
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
