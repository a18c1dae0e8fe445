//! Spatial indexes over record locations.
//!
//! A [`SpatialIndex`] answers the two spatial predicates over the positions
//! of located records in the collection. Two implementations exist: an
//! in-memory R*-tree and a storage-backed point table.

pub mod rtree;
pub mod stored;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};
use crate::geo::{GeoPoint, PolygonRing};
use crate::storage::Storage;

pub use rtree::RTreeSpatialIndex;
pub use stored::{LOCATIONS_FILE, StoredSpatialIndex};

/// A located record matched by a radius search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    /// Position of the record in the collection.
    pub position: usize,
    /// Great-circle distance from the search center in meters.
    pub distance_m: f64,
}

/// Index over `(collection position, location)` pairs.
pub trait SpatialIndex: Send + Sync + std::fmt::Debug {
    /// Short backend name, recorded in the manifest.
    fn name(&self) -> &'static str;

    /// Number of indexed locations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every location within `radius_m` meters of `center`, ascending by
    /// distance with ties in collection order.
    fn within_radius(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<SpatialHit>>;

    /// Positions of every location inside or on `ring`, in collection order.
    fn within_polygon(&self, ring: &PolygonRing) -> Result<Vec<usize>>;
}

/// Which [`SpatialIndex`] implementation a collection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialBackend {
    #[default]
    Rtree,
    Stored,
}

impl SpatialBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialBackend::Rtree => "rtree",
            SpatialBackend::Stored => "stored",
        }
    }

    /// Build a fresh index over `locations`.
    pub fn build(
        self,
        locations: &[(usize, GeoPoint)],
        storage: &Arc<dyn Storage>,
    ) -> Result<Arc<dyn SpatialIndex>> {
        Ok(match self {
            SpatialBackend::Rtree => Arc::new(RTreeSpatialIndex::new(locations)),
            SpatialBackend::Stored => {
                Arc::new(StoredSpatialIndex::build(Arc::clone(storage), locations)?)
            }
        })
    }

    /// Reattach to the index of an already-built collection.
    pub fn open(
        self,
        locations: &[(usize, GeoPoint)],
        storage: &Arc<dyn Storage>,
    ) -> Result<Arc<dyn SpatialIndex>> {
        Ok(match self {
            SpatialBackend::Rtree => Arc::new(RTreeSpatialIndex::new(locations)),
            SpatialBackend::Stored => Arc::new(StoredSpatialIndex::open(Arc::clone(storage))?),
        })
    }
}

impl std::fmt::Display for SpatialBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpatialBackend {
    type Err = GeoSightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rtree" => Ok(SpatialBackend::Rtree),
            "stored" => Ok(SpatialBackend::Stored),
            other => Err(GeoSightError::config(format!(
                "Unknown spatial backend: {other}"
            ))),
        }
    }
}

/// Order radius hits by distance, ties by collection position.
pub(crate) fn sort_hits(hits: &mut [SpatialHit]) {
    hits.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then(a.position.cmp(&b.position))
    });
}
