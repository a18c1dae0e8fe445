//! # GeoSight
//!
//! Geospatial indexing and query engine for incident sighting records.
//!
//! ## Features
//!
//! - Normalization of raw exports (CSV, JSON Lines) into a geo-indexed collection
//! - Radius and polygon queries over an R*-tree or a storage-backed point table
//! - Case-insensitive equality and free-text queries
//! - Deterministic illustrative media references with one random shape draw
//! - Paginated, optionally sorted JSON responses
//! - Pluggable storage backends

pub mod builder;
pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod media;
pub mod normalize;
pub mod query;
pub mod raw;
pub mod record;
pub mod spatial;
pub mod storage;
pub mod store;

pub mod prelude {
    pub use crate::builder::{BuildReport, GeoIndexBuilder};
    pub use crate::category::CategoryMap;
    pub use crate::config::GeoSightConfig;
    pub use crate::error::{GeoSightError, Result};
    pub use crate::geo::{DistanceUnit, GeoPoint, PolygonRing};
    pub use crate::media::{MediaCatalog, MediaResolver};
    pub use crate::normalize::CoordinatePolicy;
    pub use crate::query::{Predicate, QueryEngine, QueryRequest, QueryResponse};
    pub use crate::record::{IndexedRecord, RawRecord};
    pub use crate::spatial::SpatialBackend;
    pub use crate::store::{RecordField, SightingStore};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
