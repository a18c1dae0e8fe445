//! Query responses as returned to the presentation layer.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::media::{MediaCatalog, MediaRef};
use crate::query::page::Page;
use crate::record::IndexedRecord;

/// A record as presented to callers, media inlined as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    pub id: String,
    pub region_code: Option<String>,
    pub sub_region: String,
    pub country: Option<String>,
    pub shape_category: Option<String>,
    pub free_text: String,
    pub reporter_handle: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub location: Option<GeoPoint>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Distance from the search center, on nearby results only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    pub user_comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_image: Option<String>,
}

impl RecordView {
    /// Build a view; media is inlined only when a catalog is given.
    pub fn from_record(
        record: &IndexedRecord,
        distance_m: Option<f64>,
        catalog: Option<&MediaCatalog>,
    ) -> Self {
        let inline = |media_ref: &Option<MediaRef>| {
            catalog.zip(media_ref.as_ref()).and_then(|(c, r)| inline_media(c, r))
        };

        RecordView {
            id: record.id.clone(),
            region_code: record.region_code.clone(),
            sub_region: record.sub_region.clone(),
            country: record.country.clone(),
            shape_category: record.shape_category.clone(),
            free_text: record.free_text.clone(),
            reporter_handle: record.reporter_handle.clone(),
            attributes: record.attributes.clone(),
            location: record.location,
            latitude: record.latitude(),
            longitude: record.longitude(),
            distance_m,
            user_comments: record.user_comments.clone(),
            region_image: inline(&record.region_image_ref),
            shape_image: inline(&record.shape_image_ref),
        }
    }
}

fn inline_media(catalog: &MediaCatalog, media_ref: &MediaRef) -> Option<String> {
    match catalog.fetch(media_ref) {
        Ok(Some(bytes)) => Some(STANDARD.encode(bytes)),
        Ok(None) => {
            warn!("Media reference {media_ref} is not in the catalog");
            None
        }
        Err(e) => {
            warn!("Failed to read media {media_ref}: {e}");
            None
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<RecordView>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

impl From<Page<RecordView>> for QueryResponse {
    fn from(page: Page<RecordView>) -> Self {
        QueryResponse {
            data: page.items,
            page: page.page,
            limit: page.limit,
            total: page.total,
            has_more: page.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_view_inlines_media_as_base64() {
        let storage = MemoryStorage::new();
        storage.put("ny.jpg", b"jpeg bytes");
        let catalog = MediaCatalog::from_storage(Arc::new(storage)).unwrap();

        let raw = RawRecord {
            id: "1".to_string(),
            region_code: Some("ny".to_string()),
            ..Default::default()
        };
        let mut record = IndexedRecord::from_raw(&raw, Some(GeoPoint::new(-77.6, 43.15)));
        record.region_image_ref = catalog.lookup("ny.jpg").cloned();

        let view = RecordView::from_record(&record, None, Some(&catalog));
        assert_eq!(view.region_image.as_deref(), Some("anBlZyBieXRlcw=="));
        assert_eq!(view.shape_image, None);
        assert_eq!(view.latitude, Some(43.15));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("shape_image").is_none());
        assert!(json.get("distance_m").is_none());
        assert_eq!(json["longitude"], -77.6);

        let bare = RecordView::from_record(&record, None, None);
        assert_eq!(bare.region_image, None);
    }

    #[test]
    fn test_view_of_unlocated_record() {
        let record = IndexedRecord::from_raw(&RawRecord::default(), None);
        let json = serde_json::to_value(RecordView::from_record(&record, None, None)).unwrap();

        assert!(json["location"].is_null());
        assert!(json["latitude"].is_null());
        assert!(json["longitude"].is_null());
    }
}
