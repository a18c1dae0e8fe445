//! Closed polygon rings for containment queries.

use geo::{Coord, Intersects, Line, LineString, Point, Polygon};

use crate::error::{GeoSightError, Result};
use crate::geo::point::{GeoBounds, GeoPoint};

/// Minimum number of positions in a closed ring (a triangle plus closure).
pub const MIN_RING_POSITIONS: usize = 4;

/// A validated, closed, simple polygon ring in `[lon, lat]` order.
///
/// Containment is inclusive: points on an edge or vertex count as inside.
#[derive(Debug, Clone)]
pub struct PolygonRing {
    positions: Vec<GeoPoint>,
    polygon: Polygon<f64>,
    bounds: GeoBounds,
}

impl PolygonRing {
    /// Validate and build a ring from raw `[lon, lat]` pairs.
    ///
    /// Rejects rings that are too short, not closed, carry non-finite or
    /// out-of-range positions, or intersect themselves.
    pub fn new(coordinates: &[[f64; 2]]) -> Result<Self> {
        if coordinates.len() < MIN_RING_POSITIONS {
            return Err(GeoSightError::invalid_query(format!(
                "Polygon ring needs at least {MIN_RING_POSITIONS} positions, got {}",
                coordinates.len()
            )));
        }

        let mut positions = Vec::with_capacity(coordinates.len());
        for [lon, lat] in coordinates {
            positions.push(GeoPoint::checked(*lon, *lat)?);
        }

        let first = positions[0];
        let last = positions[positions.len() - 1];
        if first != last {
            return Err(GeoSightError::invalid_query(
                "Polygon ring is not closed (first position must equal last)",
            ));
        }

        let edges: Vec<Line<f64>> = positions
            .windows(2)
            .map(|pair| Line::new(to_coord(&pair[0]), to_coord(&pair[1])))
            .collect();

        if edges.iter().any(|edge| edge.start == edge.end) {
            return Err(GeoSightError::invalid_query(
                "Polygon ring has repeated consecutive positions",
            ));
        }

        if let Some((i, j)) = first_self_intersection(&edges) {
            return Err(GeoSightError::invalid_query(format!(
                "Polygon ring self-intersects (edges {i} and {j})"
            )));
        }

        let exterior: LineString<f64> = positions.iter().map(to_coord).collect();
        let polygon = Polygon::new(exterior, vec![]);
        let bounds = GeoBounds::of_points(&positions)
            .ok_or_else(|| GeoSightError::internal("empty polygon ring"))?;

        Ok(PolygonRing {
            positions,
            polygon,
            bounds,
        })
    }

    /// The ring positions, closure included.
    pub fn positions(&self) -> &[GeoPoint] {
        &self.positions
    }

    /// Bounding box of the ring.
    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Whether `point` lies inside the ring or on its boundary.
    ///
    /// Out-of-range points are tested at their wrapped position.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let point = &point.wrapped();
        if !self.bounds.contains(point) {
            return false;
        }
        self.polygon.intersects(&Point::new(point.lon, point.lat))
    }
}

fn to_coord(point: &GeoPoint) -> Coord<f64> {
    Coord {
        x: point.lon,
        y: point.lat,
    }
}

/// Find two non-adjacent edges that touch.
fn first_self_intersection(edges: &[Line<f64>]) -> Option<(usize, usize)> {
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                // Adjacent edges share a vertex; they only conflict when they fold back.
                if folds_back(&edges[i], &edges[j]) {
                    return Some((i, j));
                }
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Two edges sharing a vertex overlap along a segment.
fn folds_back(a: &Line<f64>, b: &Line<f64>) -> bool {
    let da = a.delta();
    let db = b.delta();
    let cross = da.x * db.y - da.y * db.x;
    if cross != 0.0 {
        return false;
    }
    // Collinear: overlap when the directions point against each other at the shared vertex.
    let dot = da.x * db.x + da.y * db.y;
    if a.end == b.start || b.end == a.start {
        dot < 0.0
    } else {
        dot > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<[f64; 2]> {
        vec![
            [-78.0, 43.0],
            [-77.0, 43.0],
            [-77.0, 44.0],
            [-78.0, 44.0],
            [-78.0, 43.0],
        ]
    }

    #[test]
    fn test_ring_contains_interior_and_boundary() {
        let ring = PolygonRing::new(&square()).unwrap();

        assert!(ring.contains(&GeoPoint::new(-77.6, 43.15)));
        assert!(ring.contains(&GeoPoint::new(-77.0, 43.5))); // on an edge
        assert!(ring.contains(&GeoPoint::new(-78.0, 43.0))); // on a vertex
        assert!(!ring.contains(&GeoPoint::new(-76.9, 43.5)));
        assert!(!ring.contains(&GeoPoint::new(-77.5, 44.01)));
    }

    #[test]
    fn test_ring_contains_wrapped_points() {
        let full = PolygonRing::new(&[
            [-180.0, -90.0],
            [180.0, -90.0],
            [180.0, 90.0],
            [-180.0, 90.0],
            [-180.0, -90.0],
        ])
        .unwrap();
        assert!(full.contains(&GeoPoint::new(200.0, 10.0)));
        assert!(full.contains(&GeoPoint::new(-400.0, -120.0)));

        let ring = PolygonRing::new(&square()).unwrap();
        // 282.4 degrees east is 77.6 degrees west.
        assert!(ring.contains(&GeoPoint::new(282.4, 43.15)));
    }

    #[test]
    fn test_ring_rejects_short_or_unclosed() {
        let short = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]];
        assert!(PolygonRing::new(&short).unwrap_err().is_client_error());

        let mut open = square();
        open.pop();
        open.push([-78.0, 43.5]);
        assert!(PolygonRing::new(&open).is_err());
    }

    #[test]
    fn test_ring_rejects_self_intersection() {
        // Bow-tie: edges (0,0)-(1,1) and (1,0)-(0,1) cross.
        let bowtie = vec![[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        let err = PolygonRing::new(&bowtie).unwrap_err();
        assert!(err.to_string().contains("self-intersects"));
    }

    #[test]
    fn test_ring_rejects_out_of_range_positions() {
        let ring = vec![[0.0, 0.0], [190.0, 0.0], [0.0, 10.0], [0.0, 0.0]];
        assert!(PolygonRing::new(&ring).is_err());
    }

    #[test]
    fn test_ring_accepts_rochester_polygon() {
        let ring = vec![
            [-77.53931906083284, 43.12382109880875],
            [-77.48610403294003, 43.12357051452809],
            [-77.48557651606735, 43.03451155002029],
            [-77.58634092727134, 43.03360224679762],
            [-77.53931906083284, 43.12382109880875],
        ];
        let ring = PolygonRing::new(&ring).unwrap();
        assert!(ring.contains(&GeoPoint::new(-77.52, 43.08)));
        assert!(!ring.contains(&GeoPoint::new(-77.6064, 43.1563)));
        assert_eq!(ring.positions().len(), 5);
    }
}
