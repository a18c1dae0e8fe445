//! Storage-backed spatial index.
//!
//! The point table is persisted as JSON Lines in the collection storage at
//! build time and scanned with a bounding-box prefilter on each query, so
//! the index lives in the store rather than in process memory.

use std::io::{BufRead, BufReader};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};
use crate::geo::{GeoBounds, GeoPoint, PolygonRing};
use crate::spatial::{SpatialHit, SpatialIndex, sort_hits};
use crate::storage::{Storage, StorageError, write_atomic};

/// Name of the persisted point table.
pub const LOCATIONS_FILE: &str = "locations.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct LocationRow {
    position: usize,
    lon: f64,
    lat: f64,
}

/// Point table persisted in a [`Storage`].
#[derive(Debug)]
pub struct StoredSpatialIndex {
    storage: Arc<dyn Storage>,
    len: usize,
}

impl StoredSpatialIndex {
    /// Write the point table for `locations`, replacing any previous one.
    pub fn build(storage: Arc<dyn Storage>, locations: &[(usize, GeoPoint)]) -> Result<Self> {
        let mut buffer = Vec::with_capacity(locations.len() * 48);
        for (position, point) in locations {
            let row = LocationRow {
                position: *position,
                lon: point.lon,
                lat: point.lat,
            };
            serde_json::to_writer(&mut buffer, &row)?;
            buffer.push(b'\n');
        }

        write_atomic(storage.as_ref(), LOCATIONS_FILE, &buffer)?;
        debug!("Wrote {} locations to {LOCATIONS_FILE}", locations.len());

        Ok(StoredSpatialIndex {
            storage,
            len: locations.len(),
        })
    }

    /// Attach to an existing point table.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let mut index = StoredSpatialIndex { storage, len: 0 };
        index.len = index.scan(|_| {})?;
        Ok(index)
    }

    /// Remove the persisted point table.
    pub fn remove(storage: &dyn Storage) -> Result<()> {
        storage.delete_file(LOCATIONS_FILE)
    }

    /// Visit every row; returns the row count.
    fn scan<F: FnMut(LocationRow)>(&self, mut visit: F) -> Result<usize> {
        if !self.storage.file_exists(LOCATIONS_FILE) {
            return Err(GeoSightError::index_unavailable(format!(
                "{LOCATIONS_FILE} is missing"
            )));
        }

        let input = self.storage.open_input(LOCATIONS_FILE).map_err(|e| match e {
            GeoSightError::Storage(msg) if msg.starts_with("File not found") => {
                GeoSightError::index_unavailable(msg)
            }
            other => other,
        })?;

        let mut count = 0;
        for line in BufReader::new(input).lines() {
            let line = line.map_err(|e| StorageError::IoError(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            visit(serde_json::from_str(&line)?);
            count += 1;
        }

        Ok(count)
    }
}

impl SpatialIndex for StoredSpatialIndex {
    fn name(&self) -> &'static str {
        "stored"
    }

    fn len(&self) -> usize {
        self.len
    }

    fn within_radius(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<SpatialHit>> {
        let bounds = GeoBounds::around(center, radius_m);
        let mut hits = Vec::new();

        self.scan(|row| {
            let point = GeoPoint::new(row.lon, row.lat);
            if point.in_range() && !point.within_bounds(&bounds) {
                return;
            }

            let distance_m = center.distance_to(&point);
            if distance_m <= radius_m {
                hits.push(SpatialHit {
                    position: row.position,
                    distance_m,
                });
            }
        })?;

        sort_hits(&mut hits);
        Ok(hits)
    }

    fn within_polygon(&self, ring: &PolygonRing) -> Result<Vec<usize>> {
        let mut positions = Vec::new();

        self.scan(|row| {
            if ring.contains(&GeoPoint::new(row.lon, row.lat)) {
                positions.push(row.position);
            }
        })?;

        positions.sort_unstable();
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_build_and_reopen() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let locations = vec![(0, GeoPoint::new(-77.6, 43.15)), (3, GeoPoint::new(2.35, 48.85))];

        let built = StoredSpatialIndex::build(Arc::clone(&storage), &locations).unwrap();
        assert_eq!(built.len(), 2);
        assert!(storage.file_exists(LOCATIONS_FILE));

        let reopened = StoredSpatialIndex::open(Arc::clone(&storage)).unwrap();
        assert_eq!(reopened.len(), 2);

        let hits = reopened
            .within_radius(GeoPoint::new(2.35, 48.85), 10.0)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 3);
    }

    #[test]
    fn test_missing_table_is_unavailable() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        assert!(matches!(
            StoredSpatialIndex::open(Arc::clone(&storage)),
            Err(GeoSightError::IndexUnavailable(_))
        ));

        let index = StoredSpatialIndex::build(Arc::clone(&storage), &[]).unwrap();
        StoredSpatialIndex::remove(storage.as_ref()).unwrap();
        assert!(matches!(
            index.within_radius(GeoPoint::new(0.0, 0.0), 1.0),
            Err(GeoSightError::IndexUnavailable(_))
        ));
    }
}
