use foundation::BoundingBox;
use serde::{Deserialize, Deserializer, Serialize};

/// Rows per page when the caller does not ask for a size.
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Upper bound the service applies to oversized page requests.
pub const MAX_PAGE_SIZE: u32 = 50_000;

/// One page of the ordered, optionally bbox-filtered parcel set.
///
/// Page `n` covers rows `[n * page_size, (n + 1) * page_size)` of the filtered
/// set in ordering-key order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub bbox: Option<BoundingBox>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, bbox: Option<BoundingBox>) -> Self {
        Self {
            page,
            page_size,
            bbox,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    pub fn to_query(&self) -> PageQuery {
        PageQuery {
            page: Some(self.page),
            limit: Some(self.page_size),
            min_lng: self.bbox.map(|b| b.min_lng),
            min_lat: self.bbox.map(|b| b.min_lat),
            max_lng: self.bbox.map(|b| b.max_lng),
            max_lat: self.bbox.map(|b| b.max_lat),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    ZeroPageSize,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::ZeroPageSize => write!(f, "limit must be a positive integer"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Query-string form of a page request:
/// `?page=0&limit=10000&minLng=..&minLat=..&maxLng=..&maxLat=..`.
///
/// `pageSize` is accepted as an alias of `limit`. A bbox edge that is not a
/// number (`minLng=abc`, `minLng=`) is kept as NaN so that `bbox` widens its
/// axis instead of the query being rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, alias = "pageSize", skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "lenient_edge", skip_serializing_if = "Option::is_none")]
    pub min_lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_edge", skip_serializing_if = "Option::is_none")]
    pub min_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_edge", skip_serializing_if = "Option::is_none")]
    pub max_lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_edge", skip_serializing_if = "Option::is_none")]
    pub max_lat: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Edge {
    Number(f64),
    Text(String),
}

fn lenient_edge<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let edge = Option::<Edge>::deserialize(deserializer)?;
    Ok(edge.map(|e| match e {
        Edge::Number(v) => v,
        Edge::Text(raw) => raw.trim().parse().unwrap_or(f64::NAN),
    }))
}

impl PageQuery {
    /// The spatial filter, if any. Missing edges default to the full valid
    /// range and malformed axes are widened to it; a box that ends up covering
    /// everything is no filter at all.
    pub fn bbox(&self) -> Option<BoundingBox> {
        if self.min_lng.is_none()
            && self.min_lat.is_none()
            && self.max_lng.is_none()
            && self.max_lat.is_none()
        {
            return None;
        }

        let world = BoundingBox::WORLD;
        let bbox = BoundingBox::new(
            self.min_lng.unwrap_or(world.min_lng),
            self.min_lat.unwrap_or(world.min_lat),
            self.max_lng.unwrap_or(world.max_lng),
            self.max_lat.unwrap_or(world.max_lat),
        )
        .sanitized();

        (!bbox.is_unbounded()).then_some(bbox)
    }

    pub fn to_request(&self, limits: PageLimits) -> Result<PageRequest, QueryError> {
        let page_size = match self.limit {
            Some(0) => return Err(QueryError::ZeroPageSize),
            Some(n) => n.min(limits.max_page_size),
            None => limits.default_page_size,
        };
        Ok(PageRequest::new(
            self.page.unwrap_or(0),
            page_size,
            self.bbox(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_without_filter() {
        let req = PageQuery::default()
            .to_request(PageLimits::default())
            .expect("request");
        assert_eq!(req, PageRequest::new(0, DEFAULT_PAGE_SIZE, None));
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn zero_limit_is_rejected_and_large_limit_capped() {
        let q = PageQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(
            q.to_request(PageLimits::default()),
            Err(QueryError::ZeroPageSize)
        );

        let q = PageQuery {
            page: Some(3),
            limit: Some(1_000_000),
            ..Default::default()
        };
        let req = q.to_request(PageLimits::default()).expect("request");
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 3 * u64::from(MAX_PAGE_SIZE));
    }

    #[test]
    fn partial_bbox_fills_missing_edges() {
        let q = PageQuery {
            min_lng: Some(-87.0),
            max_lng: Some(-86.5),
            ..Default::default()
        };
        let b = q.bbox().expect("bbox");
        assert_eq!(b, BoundingBox::new(-87.0, -90.0, -86.5, 90.0));
    }

    #[test]
    fn malformed_bbox_becomes_unbounded() {
        let q = PageQuery {
            min_lng: Some(10.0),
            min_lat: Some(10.0),
            max_lng: Some(-10.0),
            max_lat: Some(-10.0),
            ..Default::default()
        };
        assert_eq!(q.bbox(), None);
    }

    #[test]
    fn unparseable_edge_widens_its_axis() {
        let q: PageQuery =
            serde_json::from_str(r#"{"minLng":"abc","maxLng":"-86.5"}"#).expect("lenient");
        assert!(q.min_lng.is_some_and(f64::is_nan));
        assert_eq!(q.max_lng, Some(-86.5));
        assert_eq!(q.bbox(), None);

        let q: PageQuery = serde_json::from_str(
            r#"{"minLng":"","maxLng":"","minLat":"33.3","maxLat":33.8}"#,
        )
        .expect("lenient");
        assert_eq!(q.bbox(), Some(BoundingBox::new(-180.0, 33.3, 180.0, 33.8)));
    }

    #[test]
    fn request_round_trips_through_query_string_form() {
        let req = PageRequest::new(2, 500, Some(BoundingBox::new(-87.0, 33.3, -86.5, 33.8)));
        let q = req.to_query();
        let json = serde_json::to_value(&q).expect("serialize");
        assert_eq!(json["minLng"], -87.0);
        assert_eq!(json["limit"], 500);
        assert_eq!(q.to_request(PageLimits::default()).expect("request"), req);

        let aliased: PageQuery =
            serde_json::from_str(r#"{"page":1,"pageSize":25}"#).expect("alias");
        assert_eq!(aliased.limit, Some(25));
    }
}
