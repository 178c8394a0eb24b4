//! SQLite-backed parcel store.
//!
//! Rows are ordered by `gid`, an autoincrement key, so `LIMIT/OFFSET` pages
//! never overlap and never skip a row while the table is unchanged. The extent
//! columns form the spatial index used as a prefilter; the exact test is the
//! `parcel_intersects` SQL function registered on every pooled connection.

use std::path::Path;
use std::time::Duration;

use foundation::BoundingBox;
use geo::{Intersects, MultiPolygon, Rect, coord};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Row, params};
use serde_json::{Map, Value};
use streaming::{
    Feature, FeatureCollection, GeometryError, ORDERING_KEY, PARCEL_ID_KEY, PageRequest,
    geometry_extent, normalize_geometry,
};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS parcels (
    gid INTEGER PRIMARY KEY AUTOINCREMENT,
    parcelid TEXT NOT NULL UNIQUE,
    geometry TEXT NOT NULL,
    min_lng REAL NOT NULL,
    min_lat REAL NOT NULL,
    max_lng REAL NOT NULL,
    max_lat REAL NOT NULL,
    properties TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_parcels_extent ON parcels (min_lng, max_lng, min_lat, max_lat);
";

const PAGE_SQL: &str = "
SELECT gid, parcelid, geometry, properties
FROM parcels
ORDER BY gid
LIMIT ?1 OFFSET ?2
";

const PAGE_IN_BBOX_SQL: &str = "
SELECT gid, parcelid, geometry, properties
FROM parcels
WHERE max_lng >= ?1 AND min_lng <= ?3 AND max_lat >= ?2 AND min_lat <= ?4
  AND parcel_intersects(geometry, ?1, ?2, ?3, ?4)
ORDER BY gid
LIMIT ?5 OFFSET ?6
";

const INSERT_SQL: &str = "
INSERT INTO parcels (parcelid, geometry, min_lng, min_lat, max_lng, max_lat, properties)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

const CLEAR_SQL: &str = "
DELETE FROM parcels;
DELETE FROM sqlite_sequence WHERE name = 'parcels';
";

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Pool(r2d2::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    Geometry { parcel: String, error: GeometryError },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store directory: {e}"),
            StoreError::Pool(e) => write!(f, "connection pool: {e}"),
            StoreError::Sql(e) => write!(f, "sqlite: {e}"),
            StoreError::Json(e) => write!(f, "stored json: {e}"),
            StoreError::Geometry { parcel, error } => write!(f, "parcel {parcel}: {error}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Pool(e) => Some(e),
            StoreError::Sql(e) => Some(e),
            StoreError::Json(e) => Some(e),
            StoreError::Geometry { error, .. } => Some(error),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Pool(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sql(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        register_functions(conn)
    }
}

fn register_functions(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.create_scalar_function(
        "parcel_intersects",
        5,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let geometry: String = ctx.get(0)?;
            let bbox = BoundingBox::new(ctx.get(1)?, ctx.get(2)?, ctx.get(3)?, ctx.get(4)?);
            geometry_intersects(&geometry, &bbox).map_err(rusqlite::Error::UserFunctionError)
        },
    )
}

/// Exact test of a stored MultiPolygon against an inclusive rectangle;
/// touching an edge counts.
pub fn geometry_intersects(
    geometry_json: &str,
    bbox: &BoundingBox,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let geometry: geojson::Geometry = serde_json::from_str(geometry_json)?;
    let shape = MultiPolygon::<f64>::try_from(geometry.value)?;
    let rect = Rect::new(
        coord! { x: bbox.min_lng, y: bbox.min_lat },
        coord! { x: bbox.max_lng, y: bbox.max_lat },
    );
    Ok(shape.intersects(&rect))
}

struct ParcelRow {
    gid: i64,
    parcel_id: String,
    geometry: String,
    properties: String,
}

impl ParcelRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            gid: row.get(0)?,
            parcel_id: row.get(1)?,
            geometry: row.get(2)?,
            properties: row.get(3)?,
        })
    }

    fn into_feature(self) -> Result<Feature, StoreError> {
        let geometry: geojson::Geometry = serde_json::from_str(&self.geometry)?;
        let mut properties: Map<String, Value> = serde_json::from_str(&self.properties)?;
        properties.insert(ORDERING_KEY.to_string(), Value::from(self.gid));
        properties.insert(
            PARCEL_ID_KEY.to_string(),
            Value::String(self.parcel_id.clone()),
        );
        Ok(Feature::new(self.parcel_id, geometry, properties))
    }
}

pub struct ParcelStore {
    pool: Pool<SqliteConnectionManager>,
}

impl ParcelStore {
    /// Opens (creating if needed) the store at `db_path` behind a pool of
    /// `pool_size` connections.
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)?;

        pool.get()?.execute_batch(SCHEMA)?;
        info!("parcel store open at {} (pool size {pool_size})", db_path.display());

        Ok(Self { pool })
    }

    /// One page of the ordered, optionally bbox-filtered parcel set.
    ///
    /// A pooled connection is checked out for the duration of the call and
    /// returned when the guard drops, on success and on every error path.
    pub fn fetch_page(&self, request: &PageRequest) -> Result<FeatureCollection, StoreError> {
        let conn = self.pool.get()?;
        let limit = i64::from(request.page_size);
        let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);

        let rows = match request.bbox {
            Some(b) => {
                let mut stmt = conn.prepare_cached(PAGE_IN_BBOX_SQL)?;
                let rows = stmt.query_map(
                    params![b.min_lng, b.min_lat, b.max_lng, b.max_lat, limit, offset],
                    ParcelRow::read,
                )?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare_cached(PAGE_SQL)?;
                let rows = stmt.query_map(params![limit, offset], ParcelRow::read)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        debug!(
            "page {} (size {}, bbox {:?}): {} rows",
            request.page,
            request.page_size,
            request.bbox,
            rows.len()
        );

        let features = rows
            .into_iter()
            .map(ParcelRow::into_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureCollection::new(features))
    }

    /// Inserts parcels in one transaction, in order, so each gets the next
    /// ordering key. Geometries are coerced to MultiPolygon; `gid`,
    /// `parcelid` and `geometry` are not kept in the stored properties.
    pub fn insert_parcels(&self, features: &[Feature]) -> Result<usize, StoreError> {
        self.write_parcels(features, false)
    }

    /// Swaps the stored snapshot for `features`. The old rows go in the same
    /// transaction, and ordering keys restart at 1; on error nothing changes.
    pub fn replace_parcels(&self, features: &[Feature]) -> Result<usize, StoreError> {
        self.write_parcels(features, true)
    }

    fn write_parcels(&self, features: &[Feature], replace: bool) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        if replace {
            tx.execute_batch(CLEAR_SQL)?;
        }
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for feature in features {
                let geometry = normalize_geometry(feature.geometry.clone()).map_err(|error| {
                    StoreError::Geometry {
                        parcel: feature.id.clone(),
                        error,
                    }
                })?;
                let extent = geometry_extent(&geometry).ok_or_else(|| StoreError::Geometry {
                    parcel: feature.id.clone(),
                    error: GeometryError::Empty,
                })?;

                let mut properties = feature.properties.clone();
                properties.remove(ORDERING_KEY);
                properties.remove(PARCEL_ID_KEY);
                properties.remove("geometry");

                stmt.execute(params![
                    feature.id,
                    serde_json::to_string(&geometry)?,
                    extent.min_lng,
                    extent.min_lat,
                    extent.max_lng,
                    extent.max_lat,
                    serde_json::to_string(&properties)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(features.len())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM parcels", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}
