//! Assembles the complete parcel collection from a paginated source.
//!
//! Pages are requested strictly one after another, starting at page 0, until a
//! page comes back empty. There is no prefetching: at most one request is in
//! flight, and pages are concatenated in ordering-key order.
//!
//! Termination relies on the source eventually returning an empty page. The
//! ordering key is not re-validated here; `AggregatorConfig::max_pages` is the
//! optional guard against a misbehaving backend.
//!
//! Cancellation: dropping (or aborting the task running) the `load_all`
//! future stops before the next request and drops the partial collection.

use foundation::BoundingBox;
use tracing::{debug, info, warn};

use crate::protocol::{Feature, FeatureCollection};
use crate::request::{DEFAULT_PAGE_SIZE, PageRequest};
use crate::source::{PageError, PageSource};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Rows requested per page; must be positive.
    pub page_size: u32,
    /// Stop after this many non-empty pages. `None` keeps requesting until the
    /// source signals end-of-data.
    pub max_pages: Option<u32>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

#[derive(Debug)]
pub enum LoadStatus {
    /// An empty page was received; the collection is the full filtered set.
    Complete,
    /// A page request failed. Everything before `failed_page` was merged.
    Partial { failed_page: u32, error: PageError },
    /// The configured page cap was hit before end-of-data.
    PageLimitReached { max_pages: u32 },
}

/// Result of a load. Always carries whatever was assembled; callers must check
/// [`LoadOutcome::is_complete`] before treating it as the whole dataset.
#[derive(Debug)]
pub struct LoadOutcome {
    pub features: FeatureCollection,
    pub pages_merged: u32,
    pub status: LoadStatus,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, LoadStatus::Complete)
    }
}

pub async fn load_all<S>(
    source: &S,
    config: &AggregatorConfig,
    bbox: Option<BoundingBox>,
) -> LoadOutcome
where
    S: PageSource + ?Sized,
{
    let mut features: Vec<Feature> = Vec::new();
    let mut page: u32 = 0;

    let status = loop {
        if let Some(max_pages) = config.max_pages
            && page >= max_pages
        {
            warn!("stopping parcel load at page cap {max_pages}; collection may be incomplete");
            break LoadStatus::PageLimitReached { max_pages };
        }

        let request = PageRequest::new(page, config.page_size, bbox);
        match source.fetch_page(request).await {
            Ok(batch) if batch.is_empty() => {
                debug!("page {page} empty, end of data");
                break LoadStatus::Complete;
            }
            Ok(batch) => {
                debug!("page {page}: {} features", batch.len());
                features.extend(batch.features);
                page += 1;
            }
            Err(error) => {
                warn!(
                    "page {page} failed: {error}; keeping {} features from {page} pages",
                    features.len()
                );
                break LoadStatus::Partial {
                    failed_page: page,
                    error,
                };
            }
        }
    };

    info!("loaded {} parcels in {page} pages", features.len());

    LoadOutcome {
        features: FeatureCollection::new(features),
        pages_merged: page,
        status,
    }
}
