/// Valid longitude range in degrees.
pub const LNG_RANGE: (f64, f64) = (-180.0, 180.0);
/// Valid latitude range in degrees.
pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);

/// Axis-aligned lon/lat rectangle, inclusive on every edge.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub const WORLD: BoundingBox = BoundingBox {
        min_lng: LNG_RANGE.0,
        min_lat: LAT_RANGE.0,
        max_lng: LNG_RANGE.1,
        max_lat: LAT_RANGE.1,
    };

    pub const fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Replaces any axis whose bounds are non-finite or inverted with the full
    /// valid range for that axis. A malformed filter never becomes an error.
    pub fn sanitized(self) -> Self {
        let (min_lng, max_lng) = sanitize_axis(self.min_lng, self.max_lng, LNG_RANGE);
        let (min_lat, max_lat) = sanitize_axis(self.min_lat, self.max_lat, LAT_RANGE);
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// True when both axes cover the whole valid range, i.e. the box filters
    /// nothing.
    pub fn is_unbounded(&self) -> bool {
        self.min_lng <= LNG_RANGE.0
            && self.max_lng >= LNG_RANGE.1
            && self.min_lat <= LAT_RANGE.0
            && self.max_lat >= LAT_RANGE.1
    }

    /// Smallest box covering all `(lng, lat)` points, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (lng, lat) = iter.next()?;
        let mut out = Self::new(lng, lat, lng, lat);
        for (lng, lat) in iter {
            out.min_lng = out.min_lng.min(lng);
            out.min_lat = out.min_lat.min(lat);
            out.max_lng = out.max_lng.max(lng);
            out.max_lat = out.max_lat.max(lat);
        }
        Some(out)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::WORLD
    }
}

fn sanitize_axis(min: f64, max: f64, full: (f64, f64)) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() || min > max {
        return full;
    }
    (min, max)
}
