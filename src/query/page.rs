//! Pagination and sort over query result sets.

use std::cmp::Ordering;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};
use crate::record::IndexedRecord;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A 1-based page of a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    /// Rejects page 0 and a zero page size.
    pub fn new(page: usize, page_size: usize) -> Result<Self> {
        if page == 0 {
            return Err(GeoSightError::invalid_query("Page numbers start at 1"));
        }
        if page_size == 0 {
            return Err(GeoSightError::invalid_query("Page size must be positive"));
        }
        Ok(PageRequest { page, page_size })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Index range of this page within `total` results; empty past the end.
    pub fn window(&self, total: usize) -> Range<usize> {
        let start = (self.page - 1).saturating_mul(self.page_size).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }

    /// Cut this page out of a full, already ordered result set.
    pub fn apply<T>(&self, mut items: Vec<T>) -> Page<T> {
        let total = items.len();
        let window = self.window(total);
        let has_more = window.end < total;

        items.truncate(window.end);
        let items = items.split_off(window.start);

        Page {
            items,
            page: self.page,
            limit: self.page_size,
            total,
            has_more,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    /// Whether a later page holds more results.
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            has_more: self.has_more,
        }
    }
}

/// Columns a result set can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    #[serde(alias = "state")]
    Region,
    #[serde(alias = "city")]
    SubRegion,
    Country,
    Shape,
    #[serde(alias = "comments")]
    FreeText,
    #[serde(alias = "lat")]
    Latitude,
    #[serde(alias = "lon")]
    Longitude,
}

impl std::str::FromStr for SortColumn {
    type Err = GeoSightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(SortColumn::Id),
            "region" | "state" => Ok(SortColumn::Region),
            "sub_region" | "city" => Ok(SortColumn::SubRegion),
            "country" => Ok(SortColumn::Country),
            "shape" => Ok(SortColumn::Shape),
            "free_text" | "comments" => Ok(SortColumn::FreeText),
            "latitude" | "lat" => Ok(SortColumn::Latitude),
            "longitude" | "lon" => Ok(SortColumn::Longitude),
            other => Err(GeoSightError::invalid_query(format!(
                "Unknown sort column: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = GeoSightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(GeoSightError::invalid_query(format!(
                "Unknown sort direction: {other}"
            ))),
        }
    }
}

/// A column plus a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: SortColumn,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Sort selection carried by a caller between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    current: Option<SortSpec>,
}

impl SortState {
    pub fn current(&self) -> Option<SortSpec> {
        self.current
    }

    /// Select `column`: the same column again flips direction, a new column
    /// starts ascending.
    pub fn toggle(&mut self, column: SortColumn) -> SortSpec {
        let next = match self.current {
            Some(spec) if spec.column == column => SortSpec {
                column,
                direction: spec.direction.reversed(),
            },
            _ => SortSpec {
                column,
                direction: SortDirection::Asc,
            },
        };
        self.current = Some(next);
        next
    }
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey {
    Text(Option<String>),
    Number(Option<f64>),
}

fn sort_key(record: &IndexedRecord, column: SortColumn) -> SortKey {
    let text = |value: Option<&str>| SortKey::Text(value.map(str::to_lowercase));
    match column {
        SortColumn::Id => text(Some(&record.id)),
        SortColumn::Region => text(record.region_code.as_deref()),
        SortColumn::SubRegion => text(Some(&record.sub_region)),
        SortColumn::Country => text(record.country.as_deref()),
        SortColumn::Shape => text(record.shape_category.as_deref()),
        SortColumn::FreeText => text(Some(&record.free_text)),
        SortColumn::Latitude => SortKey::Number(record.latitude()),
        SortColumn::Longitude => SortKey::Number(record.longitude()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Number(Some(x)), SortKey::Number(Some(y))) => x.total_cmp(y),
        _ => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// Stably reorder `positions` by `spec`; missing values sort first ascending.
pub fn sort_positions(records: &[IndexedRecord], positions: &mut Vec<usize>, spec: SortSpec) {
    let mut keyed: Vec<(SortKey, usize)> = positions
        .iter()
        .map(|&position| (sort_key(&records[position], spec.column), position))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_keys(a, b);
        match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    *positions = keyed.into_iter().map(|(_, position)| position).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::record::RawRecord;

    fn record(id: &str, region: Option<&str>, lat: Option<f64>) -> IndexedRecord {
        let raw = RawRecord {
            id: id.to_string(),
            region_code: region.map(str::to_string),
            ..Default::default()
        };
        IndexedRecord::from_raw(&raw, lat.map(|lat| GeoPoint::new(0.0, lat)))
    }

    #[test]
    fn test_page_windows() {
        let request = PageRequest::new(2, 10).unwrap();
        let page = request.apply((0..25).collect::<Vec<_>>());
        assert_eq!(page.items, (10..20).collect::<Vec<_>>());
        assert!(page.has_more);
        assert_eq!(page.total, 25);
        assert_eq!(page.limit, 10);

        let last = PageRequest::new(3, 10).unwrap().apply((0..25).collect::<Vec<_>>());
        assert_eq!(last.items, (20..25).collect::<Vec<_>>());
        assert!(!last.has_more);

        let exact = PageRequest::new(1, 10).unwrap().apply((0..10).collect::<Vec<_>>());
        assert!(!exact.has_more);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = PageRequest::new(3, 10).unwrap().apply((0..15).collect::<Vec<_>>());
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total, 15);

        let huge = PageRequest::new(usize::MAX, 10).unwrap();
        assert_eq!(huge.window(15), 15..15);
    }

    #[test]
    fn test_page_zero_rejected() {
        assert!(matches!(
            PageRequest::new(0, 10),
            Err(GeoSightError::InvalidQuery(_))
        ));
        assert!(PageRequest::new(1, 0).is_err());
    }

    #[test]
    fn test_sort_nulls_first_ascending() {
        let records = vec![
            record("a", Some("tx"), Some(30.0)),
            record("b", None, None),
            record("c", Some("NY"), Some(43.0)),
            record("d", Some("ca"), Some(-5.0)),
        ];
        let mut positions = vec![0, 1, 2, 3];

        let ascending = SortSpec {
            column: SortColumn::Region,
            direction: SortDirection::Asc,
        };
        sort_positions(&records, &mut positions, ascending);
        assert_eq!(positions, vec![1, 3, 2, 0]);

        let descending = SortSpec {
            column: SortColumn::Latitude,
            direction: SortDirection::Desc,
        };
        sort_positions(&records, &mut positions, descending);
        assert_eq!(positions, vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_sort_is_stable() {
        let records = vec![
            record("a", Some("ny"), None),
            record("b", Some("tx"), None),
            record("c", Some("ny"), None),
            record("d", Some("NY"), None),
        ];
        let mut positions = vec![0, 1, 2, 3];
        let spec = SortSpec {
            column: SortColumn::Region,
            direction: SortDirection::Asc,
        };

        sort_positions(&records, &mut positions, spec);
        assert_eq!(positions, vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_sort_state_toggle() {
        let mut state = SortState::default();
        assert_eq!(state.current(), None);

        let first = state.toggle(SortColumn::Shape);
        assert_eq!(first.direction, SortDirection::Asc);

        let second = state.toggle(SortColumn::Shape);
        assert_eq!(second.direction, SortDirection::Desc);

        let third = state.toggle(SortColumn::Shape);
        assert_eq!(third.direction, SortDirection::Asc);

        let other = state.toggle(SortColumn::Latitude);
        assert_eq!(
            other,
            SortSpec {
                column: SortColumn::Latitude,
                direction: SortDirection::Asc
            }
        );
    }
}
