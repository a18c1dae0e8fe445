//! Query execution over the indexed collection.

use std::sync::Arc;

use log::debug;
use regex::RegexBuilder;

use crate::error::{GeoSightError, Result};
use crate::geo::{DistanceUnit, GeoPoint, PolygonRing};
use crate::media::MediaCatalog;
use crate::query::page::{DEFAULT_PAGE_SIZE, PageRequest, sort_positions};
use crate::query::request::{Predicate, QueryRequest, TextScope};
use crate::query::response::{QueryResponse, RecordView};
use crate::record::IndexedRecord;
use crate::store::{CollectionReader, RecordField, SightingStore};

/// A matched record position, with its distance on nearby queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryMatch {
    pub position: usize,
    pub distance_m: Option<f64>,
}

impl QueryMatch {
    fn at(position: usize) -> Self {
        QueryMatch {
            position,
            distance_m: None,
        }
    }
}

/// Answers [`QueryRequest`]s against a [`SightingStore`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<SightingStore>,
    catalog: Arc<MediaCatalog>,
    page_size: usize,
}

impl QueryEngine {
    pub fn new(store: Arc<SightingStore>, catalog: Arc<MediaCatalog>) -> Self {
        QueryEngine {
            store,
            catalog,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn store(&self) -> &Arc<SightingStore> {
        &self.store
    }

    /// Run a request and return the requested page.
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let page = PageRequest::new(request.page, self.page_size)?;

        if request.sort.is_some() && matches!(request.predicate, Predicate::Nearby { .. }) {
            return Err(GeoSightError::invalid_query(
                "Nearby results are ordered by distance and cannot be re-sorted",
            ));
        }

        let reader = self.store.reader();
        let mut matches = self.find(&reader, &request.predicate)?;
        debug!(
            "{} query matched {} of {} records",
            request.predicate.name(),
            matches.len(),
            reader.records().len()
        );

        if let Some(spec) = request.sort {
            let mut positions: Vec<usize> = matches.iter().map(|m| m.position).collect();
            sort_positions(reader.records(), &mut positions, spec);
            matches = positions.into_iter().map(QueryMatch::at).collect();
        }

        let catalog = request.include_media.then_some(self.catalog.as_ref());
        let response = page
            .apply(matches)
            .map(|m| view(reader.records(), m, catalog));

        Ok(response.into())
    }

    /// Every match of `predicate`, in result order: distance for nearby,
    /// collection order otherwise.
    pub fn find(&self, reader: &CollectionReader<'_>, predicate: &Predicate) -> Result<Vec<QueryMatch>> {
        match predicate {
            Predicate::Nearby {
                lat,
                lon,
                radius,
                unit,
            } => nearby(reader, *lat, *lon, *radius, *unit),
            Predicate::Polygon { ring } => {
                let ring = PolygonRing::new(ring)?;
                let positions = reader.spatial()?.within_polygon(&ring)?;
                Ok(positions.into_iter().map(QueryMatch::at).collect())
            }
            Predicate::Equals { field, value } => Ok(reader
                .equal_positions(*field, value)
                .into_iter()
                .map(QueryMatch::at)
                .collect()),
            Predicate::Text { q, scope } => text(reader, q, *scope),
        }
    }

    /// A single record by id.
    pub fn record(&self, id: &str, include_media: bool) -> Result<RecordView> {
        let reader = self.store.reader();
        let position = reader
            .position_of(id)
            .ok_or_else(|| GeoSightError::not_found(format!("No record with id '{id}'")))?;

        let catalog = include_media.then_some(self.catalog.as_ref());
        Ok(view(reader.records(), QueryMatch::at(position), catalog))
    }

    /// Sorted distinct non-empty values of a field.
    pub fn distinct(&self, field: RecordField) -> Vec<String> {
        self.store.distinct_values(field)
    }

    /// Append a user comment to a record.
    pub fn append_comment(&self, id: &str, comment: &str) -> Result<()> {
        self.store.append_comment(id, comment)
    }
}

fn view(records: &[IndexedRecord], m: QueryMatch, catalog: Option<&MediaCatalog>) -> RecordView {
    RecordView::from_record(&records[m.position], m.distance_m, catalog)
}

fn nearby(
    reader: &CollectionReader<'_>,
    lat: f64,
    lon: f64,
    radius: f64,
    unit: DistanceUnit,
) -> Result<Vec<QueryMatch>> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(GeoSightError::invalid_query(format!(
            "Radius must be a positive number, got {radius}"
        )));
    }
    let center = GeoPoint::checked(lon, lat)?;
    let radius_m = unit.to_meters(radius);

    let hits = reader.spatial()?.within_radius(center, radius_m)?;
    Ok(hits
        .into_iter()
        .map(|hit| QueryMatch {
            position: hit.position,
            distance_m: Some(hit.distance_m),
        })
        .collect())
}

fn text(reader: &CollectionReader<'_>, q: &str, scope: TextScope) -> Result<Vec<QueryMatch>> {
    let token = q.trim();
    if token.is_empty() {
        return Err(GeoSightError::invalid_query("Search text must not be empty"));
    }

    let pattern = RegexBuilder::new(&regex::escape(token))
        .case_insensitive(true)
        .build()
        .map_err(|e| GeoSightError::internal(format!("Failed to build text matcher: {e}")))?;

    let matches = |record: &IndexedRecord| match scope {
        TextScope::FreeText => pattern.is_match(&record.free_text),
        TextScope::All => {
            pattern.is_match(&record.free_text)
                || pattern.is_match(&record.sub_region)
                || record.region_code.as_deref().is_some_and(|v| pattern.is_match(v))
                || record.shape_category.as_deref().is_some_and(|v| pattern.is_match(v))
        }
    };

    Ok(reader
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| matches(record))
        .map(|(position, _)| QueryMatch::at(position))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::page::{SortColumn, SortDirection, SortSpec};
    use crate::record::RawRecord;
    use crate::spatial::SpatialBackend;
    use crate::storage::{MemoryStorage, Storage};
    use uuid::Uuid;

    fn engine_with(records: Vec<IndexedRecord>, indexed: bool) -> QueryEngine {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = SightingStore::open(storage, SpatialBackend::Rtree).unwrap();
        let build_id = Uuid::new_v4();
        store.install(records, build_id).unwrap();
        if indexed {
            store.build_indexes().unwrap();
            store.commit(build_id).unwrap();
        }
        QueryEngine::new(Arc::new(store), Arc::new(MediaCatalog::empty())).with_page_size(2)
    }

    fn record(id: &str, city: &str, text: &str, location: Option<(f64, f64)>) -> IndexedRecord {
        let raw = RawRecord {
            id: id.to_string(),
            region_code: Some("ny".to_string()),
            sub_region: city.to_string(),
            shape_category: Some("light".to_string()),
            free_text: text.to_string(),
            ..Default::default()
        };
        IndexedRecord::from_raw(&raw, location.map(|(lon, lat)| GeoPoint::new(lon, lat)))
    }

    fn sample() -> Vec<IndexedRecord> {
        vec![
            record("a", "Rochester", "Bright LIGHT over lake", Some((-77.6, 43.15))),
            record("b", "Buffalo", "humming noise", Some((-78.88, 42.89))),
            record("c", "Rochester", "two lights", None),
            record("d", "Albany", "a.b pattern", Some((-77.61, 43.16))),
        ]
    }

    fn ids(response: &QueryResponse) -> Vec<&str> {
        response.data.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_nearby_distance_order() {
        let engine = engine_with(sample(), true).with_page_size(10);
        let request = QueryRequest::new(Predicate::Nearby {
            lat: 43.15,
            lon: -77.6,
            radius: 5.0,
            unit: DistanceUnit::Kilometers,
        });

        let response = engine.execute(&request).unwrap();
        assert_eq!(ids(&response), vec!["a", "d"]);
        assert_eq!(response.data[0].distance_m, Some(0.0));
        assert!(response.data[1].distance_m.unwrap() > 0.0);
    }

    #[test]
    fn test_nearby_validation() {
        let engine = engine_with(sample(), true);
        let nearby = |lat: f64, lon: f64, radius: f64| {
            QueryRequest::new(Predicate::Nearby {
                lat,
                lon,
                radius,
                unit: DistanceUnit::Miles,
            })
        };

        for request in [
            nearby(43.0, -77.0, 0.0),
            nearby(43.0, -77.0, -1.0),
            nearby(43.0, -77.0, f64::NAN),
            nearby(95.0, -77.0, 1.0),
            nearby(43.0, 190.0, 1.0),
        ] {
            assert!(matches!(
                engine.execute(&request),
                Err(GeoSightError::InvalidQuery(_))
            ));
        }

        let sorted = nearby(43.0, -77.0, 1.0).with_sort(SortSpec {
            column: SortColumn::Id,
            direction: SortDirection::Asc,
        });
        assert!(matches!(
            engine.execute(&sorted),
            Err(GeoSightError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_spatial_unavailable_without_index() {
        let engine = engine_with(sample(), false);
        let request = QueryRequest::new(Predicate::Polygon {
            ring: vec![[-80.0, 40.0], [-70.0, 40.0], [-70.0, 45.0], [-80.0, 40.0]],
        });
        assert!(matches!(
            engine.execute(&request),
            Err(GeoSightError::IndexUnavailable(_))
        ));

        let equals = QueryRequest::new(Predicate::Equals {
            field: RecordField::SubRegion,
            value: "rochester".to_string(),
        });
        assert_eq!(ids(&engine.execute(&equals).unwrap()), vec!["a", "c"]);
    }

    #[test]
    fn test_polygon_query() {
        let engine = engine_with(sample(), true).with_page_size(10);
        let request = QueryRequest::new(Predicate::Polygon {
            ring: vec![[-78.0, 43.0], [-77.0, 43.0], [-77.0, 44.0], [-78.0, 44.0], [-78.0, 43.0]],
        });
        assert_eq!(ids(&engine.execute(&request).unwrap()), vec!["a", "d"]);

        let open_ring = QueryRequest::new(Predicate::Polygon {
            ring: vec![[-78.0, 43.0], [-77.0, 43.0], [-77.0, 44.0], [-78.0, 44.0]],
        });
        assert!(matches!(
            engine.execute(&open_ring),
            Err(GeoSightError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_text_query() {
        let engine = engine_with(sample(), true).with_page_size(10);
        let text = |q: &str, scope| QueryRequest::new(Predicate::Text { q: q.to_string(), scope });

        let response = engine.execute(&text("light", TextScope::FreeText)).unwrap();
        assert_eq!(ids(&response), vec!["a", "c"]);

        // Metacharacters match literally.
        let response = engine.execute(&text("a.b", TextScope::FreeText)).unwrap();
        assert_eq!(ids(&response), vec!["d"]);

        let response = engine.execute(&text("buffalo", TextScope::All)).unwrap();
        assert_eq!(ids(&response), vec!["b"]);

        assert!(matches!(
            engine.execute(&text("  ", TextScope::FreeText)),
            Err(GeoSightError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_pagination_and_sort() {
        let engine = engine_with(sample(), true);
        let all = QueryRequest::new(Predicate::Equals {
            field: RecordField::Region,
            value: "NY".to_string(),
        });

        let first = engine.execute(&all).unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);
        assert!(first.has_more);
        assert_eq!(first.total, 4);
        assert_eq!(first.limit, 2);

        let second = engine.execute(&all.clone().with_page(2)).unwrap();
        assert_eq!(ids(&second), vec!["c", "d"]);
        assert!(!second.has_more);

        let past_end = engine.execute(&all.clone().with_page(3)).unwrap();
        assert!(past_end.data.is_empty());
        assert!(!past_end.has_more);

        assert!(matches!(
            engine.execute(&all.clone().with_page(0)),
            Err(GeoSightError::InvalidQuery(_))
        ));

        let by_city = all.with_sort(SortSpec {
            column: SortColumn::SubRegion,
            direction: SortDirection::Desc,
        });
        let sorted = engine.execute(&by_city).unwrap();
        assert_eq!(ids(&sorted), vec!["a", "c"]);
        let sorted = engine.execute(&by_city.with_page(2)).unwrap();
        assert_eq!(ids(&sorted), vec!["b", "d"]);
    }

    #[test]
    fn test_record_detail() {
        let engine = engine_with(sample(), true);
        assert_eq!(engine.record("c", true).unwrap().sub_region, "Rochester");
        assert!(matches!(
            engine.record("missing", true),
            Err(GeoSightError::NotFound(_))
        ));
    }
}
