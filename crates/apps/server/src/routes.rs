use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use streaming::{PageLimits, PageQuery};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::store::ParcelStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ParcelStore>,
    pub limits: PageLimits,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/parcels", get(get_parcels))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

/// `GET /api/parcels?page=&limit=&minLng=&minLat=&maxLng=&maxLat=`
///
/// Either a complete feature collection or an explicit error status; the body
/// is serialized in full before any byte is sent.
async fn get_parcels(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let request = match query.to_request(state.limits) {
        Ok(r) => r,
        Err(err) => {
            warn!("rejected parcel query {query:?}: {err}");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let store = Arc::clone(&state.store);
    let page = match tokio::task::spawn_blocking(move || store.fetch_page(&request)).await {
        Ok(Ok(page)) => page,
        Ok(Err(err)) => {
            error!("parcel page {} failed: {err}", request.page);
            return (StatusCode::SERVICE_UNAVAILABLE, "Failed to fetch parcels").into_response();
        }
        Err(err) => {
            error!("parcel page {} task failed: {err}", request.page);
            return (StatusCode::SERVICE_UNAVAILABLE, "Failed to fetch parcels").into_response();
        }
    };

    let body = match serde_json::to_string(&page) {
        Ok(v) => v,
        Err(err) => {
            error!("parcel page serialization failed: {err}");
            return (StatusCode::SERVICE_UNAVAILABLE, "Failed to fetch parcels").into_response();
        }
    };
    debug!("served page {} with {} parcels", request.page, page.len());

    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    (StatusCode::OK, headers, Body::from(body)).into_response()
}
