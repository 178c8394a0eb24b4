//! In-process `PageSource` over the parcel store.

use std::sync::Arc;

use streaming::{BoxFuture, FeatureCollection, PageError, PageRequest, PageSource};

use crate::store::ParcelStore;

/// Serves pages straight from the store on tokio's blocking pool, for callers
/// that share a process with the database.
#[derive(Clone)]
pub struct StorePageSource {
    store: Arc<ParcelStore>,
}

impl StorePageSource {
    pub fn new(store: Arc<ParcelStore>) -> Self {
        Self { store }
    }
}

impl PageSource for StorePageSource {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> BoxFuture<'_, Result<FeatureCollection, PageError>> {
        let store = Arc::clone(&self.store);
        Box::pin(async move {
            let page = request.page;
            match tokio::task::spawn_blocking(move || store.fetch_page(&request)).await {
                Ok(Ok(features)) => Ok(features),
                Ok(Err(err)) => {
                    Err(PageError::with_source(format!("page {page}: store unavailable"), err)
                        .with_status(503))
                }
                Err(err) => Err(PageError::with_source(format!("page {page}: task failed"), err)
                    .with_status(503)),
            }
        })
    }
}
