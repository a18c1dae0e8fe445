//! In-memory R*-tree spatial index.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::error::Result;
use crate::geo::{GeoBounds, GeoPoint, PolygonRing};
use crate::spatial::{SpatialHit, SpatialIndex, sort_hits};

/// A `[lon, lat]` point tagged with its collection position.
type IndexedLocation = GeomWithData<[f64; 2], usize>;

/// R*-tree over in-range locations.
///
/// Out-of-range locations kept by the pass-through coordinate policy do not
/// fit the degree envelope prefilter, so they are held aside and checked
/// exactly on every query.
#[derive(Debug)]
pub struct RTreeSpatialIndex {
    tree: RTree<IndexedLocation>,
    outliers: Vec<(usize, GeoPoint)>,
}

impl RTreeSpatialIndex {
    /// Bulk-load the tree from `(position, location)` pairs.
    pub fn new(locations: &[(usize, GeoPoint)]) -> Self {
        let (in_range, outliers): (Vec<_>, Vec<_>) =
            locations.iter().copied().partition(|(_, point)| point.in_range());

        let entries = in_range
            .into_iter()
            .map(|(position, point)| IndexedLocation::new([point.lon, point.lat], position))
            .collect();

        RTreeSpatialIndex {
            tree: RTree::bulk_load(entries),
            outliers,
        }
    }
}

fn envelope(bounds: &GeoBounds) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [bounds.min_lon, bounds.min_lat],
        [bounds.max_lon, bounds.max_lat],
    )
}

impl SpatialIndex for RTreeSpatialIndex {
    fn name(&self) -> &'static str {
        "rtree"
    }

    fn len(&self) -> usize {
        self.tree.size() + self.outliers.len()
    }

    fn within_radius(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<SpatialHit>> {
        let search = envelope(&GeoBounds::around(center, radius_m));

        let candidates = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|entry| {
                let [lon, lat] = *entry.geom();
                (entry.data, GeoPoint::new(lon, lat))
            })
            .chain(self.outliers.iter().copied());

        let mut hits: Vec<SpatialHit> = candidates
            .filter_map(|(position, point)| {
                let distance_m = center.distance_to(&point);
                (distance_m <= radius_m).then_some(SpatialHit {
                    position,
                    distance_m,
                })
            })
            .collect();

        sort_hits(&mut hits);
        Ok(hits)
    }

    fn within_polygon(&self, ring: &PolygonRing) -> Result<Vec<usize>> {
        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope(&ring.bounds()))
            .map(|entry| {
                let [lon, lat] = *entry.geom();
                (entry.data, GeoPoint::new(lon, lat))
            })
            .chain(self.outliers.iter().copied())
            .filter(|(_, point)| ring.contains(point))
            .map(|(position, _)| position)
            .collect();

        positions.sort_unstable();
        Ok(positions)
    }
}
