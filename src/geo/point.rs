//! Geographical points, great-circle distances and radius units.

use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

const METERS_PER_MILE: f64 = 1_609.344;

/// A geographical point stored in GeoJSON axis order (longitude, latitude).
///
/// Construction through [`GeoPoint::new`] does not range-check; records
/// normalized under the pass-through coordinate policy may carry
/// out-of-range values. Query centers go through [`GeoPoint::checked`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "GeoJsonPoint", try_from = "GeoJsonPoint")]
pub struct GeoPoint {
    /// Longitude in degrees
    pub lon: f64,
    /// Latitude in degrees
    pub lat: f64,
}

impl GeoPoint {
    /// Create a point without range validation.
    pub fn new(lon: f64, lat: f64) -> Self {
        GeoPoint { lon, lat }
    }

    /// Create a point, rejecting non-finite or out-of-range coordinates.
    pub fn checked(lon: f64, lat: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoSightError::invalid_query(format!(
                "Invalid latitude: {lat} (must be between -90 and 90)"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoSightError::invalid_query(format!(
                "Invalid longitude: {lon} (must be between -180 and 180)"
            )));
        }

        Ok(GeoPoint { lon, lat })
    }

    /// Whether both coordinates lie inside the WGS84 degree ranges.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// The same place on the sphere with latitude folded into [-90, 90] and
    /// longitude wrapped into [-180, 180]. In-range points come back as is.
    ///
    /// Folding a latitude across a pole moves the point to the opposite
    /// meridian, the way the haversine formula reads it.
    pub fn wrapped(&self) -> GeoPoint {
        if self.in_range() {
            return *self;
        }

        let folded = (self.lat + 90.0).rem_euclid(360.0);
        let (lat, lon) = if folded <= 180.0 {
            (folded - 90.0, self.lon)
        } else {
            (270.0 - folded, self.lon + 180.0)
        };

        let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
        GeoPoint { lon, lat }
    }

    /// Haversine distance to another point in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Check if this point is within a rectangular bounding box.
    pub fn within_bounds(&self, bounds: &GeoBounds) -> bool {
        self.lat >= bounds.min_lat
            && self.lat <= bounds.max_lat
            && self.lon >= bounds.min_lon
            && self.lon <= bounds.max_lon
    }
}

/// Wire form of a point: `{"type": "Point", "coordinates": [lon, lat]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: [point.lon, point.lat],
        }
    }
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = String;

    fn try_from(value: GeoJsonPoint) -> std::result::Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(format!("unsupported geometry type: {}", value.kind));
        }
        Ok(GeoPoint::new(value.coordinates[0], value.coordinates[1]))
    }
}

/// An axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    /// A conservative box around `center` covering every point within
    /// `radius_m` meters.
    ///
    /// Near the poles, or when the box would cross the antimeridian, the
    /// longitude span widens to the full range.
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let angular = radius_m / EARTH_RADIUS_M;
        let lat_delta = angular.to_degrees();

        let min_lat = (center.lat - lat_delta).max(-90.0);
        let max_lat = (center.lat + lat_delta).min(90.0);

        let cos_lat = center.lat.to_radians().cos();
        let full_lon = min_lat <= -90.0 || max_lat >= 90.0 || cos_lat <= f64::EPSILON;

        if full_lon || angular >= std::f64::consts::PI {
            return GeoBounds {
                min_lon: -180.0,
                min_lat,
                max_lon: 180.0,
                max_lat,
            };
        }

        // The cap does not reach a pole here, so the ratio stays below 1.
        let lon_delta = (angular.sin() / cos_lat).min(1.0).asin().to_degrees();
        let min_lon = center.lon - lon_delta;
        let max_lon = center.lon + lon_delta;

        if min_lon < -180.0 || max_lon > 180.0 {
            GeoBounds {
                min_lon: -180.0,
                min_lat,
                max_lon: 180.0,
                max_lat,
            }
        } else {
            GeoBounds {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            }
        }
    }

    /// The bounding box of a set of points, `None` when empty.
    pub fn of_points(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = GeoBounds {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for point in &points[1..] {
            bounds.min_lon = bounds.min_lon.min(point.lon);
            bounds.min_lat = bounds.min_lat.min(point.lat);
            bounds.max_lon = bounds.max_lon.max(point.lon);
            bounds.max_lat = bounds.max_lat.max(point.lat);
        }
        Some(bounds)
    }

    /// Check if a point is within this bounding box (inclusive).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.within_bounds(self)
    }
}

/// Linear unit a caller expresses a search radius in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    #[default]
    Miles,
}

impl DistanceUnit {
    /// Convert a distance in this unit to meters.
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1_000.0,
            DistanceUnit::Miles => value * METERS_PER_MILE,
        }
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = GeoSightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "meters" | "metres" => Ok(DistanceUnit::Meters),
            "km" | "kilometers" | "kilometres" => Ok(DistanceUnit::Kilometers),
            "mi" | "miles" => Ok(DistanceUnit::Miles),
            other => Err(GeoSightError::invalid_query(format!(
                "Unknown distance unit: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_point_validation() {
        let point = GeoPoint::checked(-74.0060, 40.7128).unwrap();
        assert_eq!(point.lon, -74.0060);
        assert_eq!(point.lat, 40.7128);

        assert!(GeoPoint::checked(0.0, 91.0).is_err());
        assert!(GeoPoint::checked(181.0, 0.0).is_err());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_err());

        // Unchecked construction keeps whatever it is given.
        let wild = GeoPoint::new(200.0, -95.0);
        assert!(!wild.in_range());
    }

    #[test]
    fn test_wrapped_matches_haversine() {
        let east = GeoPoint::new(200.0, 10.0);
        assert_eq!(east.wrapped(), GeoPoint::new(-160.0, 10.0));
        assert!(east.distance_to(&east.wrapped()) < 1e-6);

        let over_pole = GeoPoint::new(10.0, 95.0);
        let wrapped = over_pole.wrapped();
        assert!((wrapped.lat - 85.0).abs() < 1e-9);
        assert!((wrapped.lon - -170.0).abs() < 1e-9);

        let inside = GeoPoint::new(180.0, -90.0);
        assert_eq!(inside.wrapped(), inside);
    }

    #[test]
    fn test_haversine_distance() {
        let nyc = GeoPoint::new(-74.0060, 40.7128);
        let la = GeoPoint::new(-118.2437, 34.0522);

        let distance = nyc.distance_to(&la);
        // Roughly 3,944 km apart.
        assert!((distance - 3_944_000.0).abs() < 100_000.0);
        assert_eq!(nyc.distance_to(&nyc), 0.0);
    }

    #[test]
    fn test_geojson_wire_form() {
        let point = GeoPoint::new(-77.6, 43.15);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], -77.6);
        assert_eq!(json["coordinates"][1], 43.15);

        let back: GeoPoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, point);

        let bad = serde_json::json!({"type": "LineString", "coordinates": [0.0, 0.0]});
        assert!(serde_json::from_value::<GeoPoint>(bad).is_err());
    }

    #[test]
    fn test_bounds_around_contains_radius() {
        let center = GeoPoint::new(-74.0060, 40.7128);
        let bounds = GeoBounds::around(center, 5_000.0);

        assert!(bounds.contains(&center));
        assert!(bounds.max_lat - bounds.min_lat < 1.0);
        assert!(bounds.max_lon - bounds.min_lon < 1.0);

        // A point ~4.4 km north must be inside the box.
        let north = GeoPoint::new(-74.0060, 40.7528);
        assert!(center.distance_to(&north) < 5_000.0);
        assert!(bounds.contains(&north));
    }

    #[test]
    fn test_bounds_widen_across_antimeridian_and_poles() {
        let bounds = GeoBounds::around(GeoPoint::new(179.9, 0.0), 50_000.0);
        assert_eq!(bounds.min_lon, -180.0);
        assert_eq!(bounds.max_lon, 180.0);

        let bounds = GeoBounds::around(GeoPoint::new(0.0, 89.9), 50_000.0);
        assert_eq!(bounds.max_lat, 90.0);
        assert_eq!(bounds.min_lon, -180.0);
    }

    #[test]
    fn test_distance_units() {
        assert_eq!(DistanceUnit::Meters.to_meters(1000.0), 1000.0);
        assert_eq!(DistanceUnit::Kilometers.to_meters(1.5), 1500.0);
        assert_eq!(DistanceUnit::Miles.to_meters(1.0), 1_609.344);
        assert_eq!("km".parse::<DistanceUnit>().unwrap(), DistanceUnit::Kilometers);
        assert!("furlongs".parse::<DistanceUnit>().is_err());
    }
}
