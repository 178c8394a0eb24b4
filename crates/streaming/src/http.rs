use crate::protocol::FeatureCollection;
use crate::request::PageRequest;
use crate::source::{BoxFuture, PageError, PageSource};

/// Page source backed by the HTTP query endpoint (`GET /api/parcels`).
pub struct HttpPageSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, Result<FeatureCollection, PageError>> {
        Box::pin(async move {
            let page = request.page;
            let resp = self
                .client
                .get(&self.endpoint)
                .query(&request.to_query())
                .send()
                .await
                .map_err(|e| PageError::with_source(format!("page {page}: request failed"), e))?;

            let status = resp.status();
            if !status.is_success() {
                // The body is a short diagnostic, never a partial collection.
                let body = resp.text().await.unwrap_or_default();
                return Err(
                    PageError::new(format!("page {page}: {}", body.trim())).with_status(status.as_u16())
                );
            }

            resp.json::<FeatureCollection>()
                .await
                .map_err(|e| PageError::with_source(format!("page {page}: invalid collection"), e))
        })
    }
}
