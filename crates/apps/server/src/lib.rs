//! Spatial query service for parcel features.
//!
//! The store keeps parcels in SQLite behind a connection pool; the router
//! exposes it as a paginated, bbox-filtered GeoJSON endpoint.

pub mod config;
pub mod routes;
pub mod source;
pub mod store;

pub use config::ServerConfig;
pub use routes::{AppState, router};
pub use source::StorePageSource;
pub use store::{ParcelStore, StoreError};
