//! The page-fetching capability the aggregator drives.

use std::future::Future;
use std::pin::Pin;

use crate::protocol::FeatureCollection;
use crate::request::PageRequest;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error returned when a page could not be produced.
///
/// Any failure is a service-unavailable condition from the aggregator's point
/// of view; `status` carries the HTTP status when one was received.
#[derive(Debug)]
pub struct PageError {
    pub message: String,
    pub status: Option<u16>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl PageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Answers paginated, optionally bbox-filtered parcel requests.
///
/// Implementations must be deterministic for a fixed request against an
/// unchanged store, and must return an empty collection once the page offset
/// reaches the end of the filtered set.
pub trait PageSource: Send + Sync {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, Result<FeatureCollection, PageError>>;
}

impl<S: PageSource + ?Sized> PageSource for std::sync::Arc<S> {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, Result<FeatureCollection, PageError>> {
        (**self).fetch_page(request)
    }
}
