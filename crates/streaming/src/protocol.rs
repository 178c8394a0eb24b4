//! Wire types shared by the parcel query service and its clients.
//!
//! A page of parcels travels as a GeoJSON `FeatureCollection`:
//! - every feature carries its parcel id, a MultiPolygon geometry and a flat
//!   property map
//! - the geometry is never repeated inside the properties
//! - `properties.gid` is the store's ordering key, strictly increasing across
//!   features and across successive pages

use foundation::BoundingBox;
use geojson::{Geometry, Value as GeoValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property holding the row ordering key.
pub const ORDERING_KEY: &str = "gid";

/// Property holding the parcel identifier.
pub const PARCEL_ID_KEY: &str = "parcelid";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// One parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    pub id: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(id: impl Into<String>, geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            tag: FeatureTag::Feature,
            id: id.into(),
            geometry,
            properties,
        }
    }

    pub fn ordering_key(&self) -> Option<u64> {
        self.properties.get(ORDERING_KEY).and_then(Value::as_u64)
    }

    /// Numeric attribute value. Numeric strings are accepted since decimal
    /// columns are sometimes exported as text.
    pub fn number(&self, key: &str) -> Option<f64> {
        let v = match self.properties.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Attribute value as a category label. `null`, arrays and objects have no
    /// category.
    pub fn category(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Ordered sequence of parcels; the unit of transfer for one page and for the
/// assembled dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub tag: CollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// An empty page is the end-of-data signal.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.iter().map(|f| f.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    Empty,
    Unsupported(&'static str),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::Empty => write!(f, "geometry has no coordinates"),
            GeometryError::Unsupported(kind) => {
                write!(f, "unsupported geometry type {kind}, expected Polygon or MultiPolygon")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Coerces a Polygon to a single-member MultiPolygon. MultiPolygons pass
/// through; anything else, or a geometry without coordinates, is rejected.
pub fn normalize_geometry(geometry: Geometry) -> Result<Geometry, GeometryError> {
    let polygons = match geometry.value {
        GeoValue::Polygon(rings) => vec![rings],
        GeoValue::MultiPolygon(polygons) => polygons,
        other => return Err(GeometryError::Unsupported(geometry_type_name(&other))),
    };

    let has_coordinates = polygons
        .iter()
        .any(|rings| rings.first().is_some_and(|outer| !outer.is_empty()));
    if !has_coordinates {
        return Err(GeometryError::Empty);
    }

    Ok(Geometry::new(GeoValue::MultiPolygon(polygons)))
}

/// Lon/lat extent of a polygonal geometry's positions.
pub fn geometry_extent(geometry: &Geometry) -> Option<BoundingBox> {
    let positions: Vec<(f64, f64)> = match &geometry.value {
        GeoValue::Polygon(rings) => rings.iter().flatten().filter_map(|p| position_xy(p)).collect(),
        GeoValue::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .flatten()
            .filter_map(|p| position_xy(p))
            .collect(),
        _ => return None,
    };
    BoundingBox::from_points(positions)
}

fn position_xy(position: &[f64]) -> Option<(f64, f64)> {
    match position {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn geometry_type_name(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::Point(_) => "Point",
        GeoValue::MultiPoint(_) => "MultiPoint",
        GeoValue::LineString(_) => "LineString",
        GeoValue::MultiLineString(_) => "MultiLineString",
        GeoValue::Polygon(_) => "Polygon",
        GeoValue::MultiPolygon(_) => "MultiPolygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(x: f64, y: f64) -> Geometry {
        Geometry::new(GeoValue::Polygon(vec![vec![
            vec![x, y],
            vec![x + 1.0, y],
            vec![x + 1.0, y + 1.0],
            vec![x, y + 1.0],
            vec![x, y],
        ]]))
    }

    #[test]
    fn polygon_is_coerced_to_multipolygon() {
        let g = normalize_geometry(square(0.0, 0.0)).expect("normalize");
        let GeoValue::MultiPolygon(polys) = &g.value else {
            panic!("expected MultiPolygon, got {:?}", g.value);
        };
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0][0].len(), 5);
    }

    #[test]
    fn rejects_points_and_empty_polygons() {
        let point = Geometry::new(GeoValue::Point(vec![1.0, 2.0]));
        assert_eq!(
            normalize_geometry(point),
            Err(GeometryError::Unsupported("Point"))
        );
        let empty = Geometry::new(GeoValue::MultiPolygon(vec![vec![vec![]]]));
        assert_eq!(normalize_geometry(empty), Err(GeometryError::Empty));
    }

    #[test]
    fn extent_covers_all_positions() {
        let g = normalize_geometry(square(-87.0, 33.0)).expect("normalize");
        let b = geometry_extent(&g).expect("extent");
        assert_eq!(b, BoundingBox::new(-87.0, 33.0, -86.0, 34.0));
    }

    #[test]
    fn wire_shape_is_geojson() {
        let mut props = Map::new();
        props.insert("gid".into(), json!(7));
        props.insert("nbhname".into(), json!("Southside"));
        let fc = FeatureCollection::new(vec![Feature::new("P-1", square(0.0, 0.0), props)]);

        let v = serde_json::to_value(&fc).expect("serialize");
        assert_eq!(v["type"], "FeatureCollection");
        assert_eq!(v["features"][0]["type"], "Feature");
        assert_eq!(v["features"][0]["id"], "P-1");
        assert_eq!(v["features"][0]["geometry"]["type"], "Polygon");
        assert!(v["features"][0]["properties"].get("geometry").is_none());

        let back: FeatureCollection = serde_json::from_value(v).expect("deserialize");
        assert_eq!(back.features[0].ordering_key(), Some(7));
    }

    #[test]
    fn attribute_accessors() {
        let mut props = Map::new();
        props.insert("valueperacre".into(), json!("1250.5"));
        props.insert("assdvalue".into(), json!(900));
        props.insert("cls".into(), json!(2));
        props.insert("owner".into(), Value::Null);
        let f = Feature::new("P-2", square(0.0, 0.0), props);

        assert_eq!(f.number("valueperacre"), Some(1250.5));
        assert_eq!(f.number("assdvalue"), Some(900.0));
        assert_eq!(f.number("owner"), None);
        assert_eq!(f.category("cls").as_deref(), Some("2"));
        assert_eq!(f.category("owner"), None);
        assert_eq!(f.category("missing"), None);
    }
}
