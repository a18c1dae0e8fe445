//! Raw and indexed sighting records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::media::MediaRef;

/// A sighting as exported by the external ingestion step.
///
/// Field aliases accept the column names of the public sightings CSV dump
/// (`state`, `city`, `shape`, `comments`, ...). The CSV reader keeps columns
/// without a dedicated field in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "state")]
    pub region_code: Option<String>,
    #[serde(default, alias = "city")]
    pub sub_region: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "shape")]
    pub shape_category: Option<String>,
    #[serde(default, alias = "longitude", deserialize_with = "text_or_number")]
    pub longitude_text: String,
    #[serde(default, alias = "latitude", deserialize_with = "text_or_number")]
    pub latitude_text: String,
    #[serde(default, alias = "comments")]
    pub free_text: String,
    #[serde(default)]
    pub reporter_handle: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Accept coordinate columns exported either as text or as JSON numbers.
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// A sighting in the geo-indexed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub region_code: Option<String>,
    pub sub_region: String,
    pub country: Option<String>,
    pub shape_category: Option<String>,
    pub free_text: String,
    pub reporter_handle: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// `None` when the raw coordinates were missing or unparsable.
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub region_image_ref: Option<MediaRef>,
    #[serde(default)]
    pub shape_image_ref: Option<MediaRef>,
    #[serde(default)]
    pub user_comments: Vec<String>,
}

impl IndexedRecord {
    /// Carry every non-coordinate attribute of `raw` over, with the given location.
    pub fn from_raw(raw: &RawRecord, location: Option<GeoPoint>) -> Self {
        IndexedRecord {
            id: raw.id.clone(),
            region_code: raw.region_code.clone(),
            sub_region: raw.sub_region.clone(),
            country: raw.country.clone(),
            shape_category: raw.shape_category.clone(),
            free_text: raw.free_text.clone(),
            reporter_handle: raw.reporter_handle.clone(),
            attributes: raw.attributes.clone(),
            location,
            region_image_ref: None,
            shape_image_ref: None,
            user_comments: Vec::new(),
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|p| p.lat)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|p| p.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_accepts_csv_column_names() {
        let json = r#"{
            "_id": "abc",
            "state": "ny",
            "city": "rochester",
            "country": "us",
            "shape": "disk",
            "longitude": "-77.6",
            "latitude": "43.15",
            "comments": "bright light over the lake"
        }"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();

        assert_eq!(raw.id, "abc");
        assert_eq!(raw.region_code.as_deref(), Some("ny"));
        assert_eq!(raw.sub_region, "rochester");
        assert_eq!(raw.shape_category.as_deref(), Some("disk"));
        assert_eq!(raw.longitude_text, "-77.6");
        assert_eq!(raw.free_text, "bright light over the lake");
        assert!(raw.reporter_handle.is_empty());

        let numeric: RawRecord =
            serde_json::from_str(r#"{"id": "n", "longitude": -77.6, "latitude": null}"#).unwrap();
        assert_eq!(numeric.longitude_text, "-77.6");
        assert_eq!(numeric.latitude_text, "");
    }

    #[test]
    fn test_indexed_record_drops_coordinate_text() {
        let raw = RawRecord {
            id: "1".to_string(),
            region_code: Some("tx".to_string()),
            longitude_text: "-97.7".to_string(),
            latitude_text: "30.2".to_string(),
            ..Default::default()
        };
        let record = IndexedRecord::from_raw(&raw, Some(GeoPoint::new(-97.7, 30.2)));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("longitude_text").is_none());
        assert_eq!(json["location"]["coordinates"][0], -97.7);
        assert!(record.user_comments.is_empty());
        assert_eq!(record.latitude(), Some(30.2));
    }

    #[test]
    fn test_null_location_serializes_as_null() {
        let record = IndexedRecord::from_raw(&RawRecord::default(), None);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["location"].is_null());

        let back: IndexedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.location, None);
    }
}
