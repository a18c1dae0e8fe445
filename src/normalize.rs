//! Coordinate normalization from raw text to a geo point.

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// What to do with parseable coordinates outside the WGS84 degree ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatePolicy {
    /// Keep the values unchanged.
    #[default]
    PassThrough,
    /// Treat the record as having no location.
    Reject,
}

impl std::str::FromStr for CoordinatePolicy {
    type Err = crate::error::GeoSightError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pass_through" => Ok(CoordinatePolicy::PassThrough),
            "reject" => Ok(CoordinatePolicy::Reject),
            other => Err(crate::error::GeoSightError::config(format!(
                "Unknown coordinate policy: {other}"
            ))),
        }
    }
}

/// Turn raw longitude and latitude text into a point.
///
/// Returns `None` when either text is empty after trimming or does not parse
/// as a finite decimal. Parse failure is never an error.
pub fn normalize_coordinates(
    longitude_text: &str,
    latitude_text: &str,
    policy: CoordinatePolicy,
) -> Option<GeoPoint> {
    let lon = parse_decimal(longitude_text)?;
    let lat = parse_decimal(latitude_text)?;
    let point = GeoPoint::new(lon, lat);

    match policy {
        CoordinatePolicy::PassThrough => Some(point),
        CoordinatePolicy::Reject if point.in_range() => Some(point),
        CoordinatePolicy::Reject => None,
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}
