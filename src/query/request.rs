//! Query requests as received from the presentation layer.
//!
//! ```json
//! {"predicate": "nearby", "lat": 43.15, "lon": -77.6, "radius": 5, "unit": "miles", "page": 1}
//! {"predicate": "polygon", "ring": [[-78, 43], [-77, 43], [-77, 44], [-78, 43]]}
//! {"predicate": "equals", "field": "region", "value": "ny", "sort": {"column": "sub_region"}}
//! {"predicate": "text", "q": "light", "scope": "all", "include_media": false}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};
use crate::geo::DistanceUnit;
use crate::query::page::SortSpec;
use crate::store::RecordField;

/// Which fields a text query searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// The free-text narrative only.
    #[default]
    FreeText,
    /// Free text, sub-region, region and shape.
    All,
}

/// Exactly one predicate per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum Predicate {
    /// Located records within a great-circle radius of a center.
    Nearby {
        lat: f64,
        lon: f64,
        radius: f64,
        #[serde(default)]
        unit: DistanceUnit,
    },
    /// Located records inside or on a closed `[lon, lat]` ring.
    Polygon { ring: Vec<[f64; 2]> },
    /// Case-insensitive exact match on a categorical field.
    Equals { field: RecordField, value: String },
    /// Case-insensitive substring match.
    Text {
        q: String,
        #[serde(default)]
        scope: TextScope,
    },
}

impl Predicate {
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Nearby { .. } => "nearby",
            Predicate::Polygon { .. } => "polygon",
            Predicate::Equals { .. } => "equals",
            Predicate::Text { .. } => "text",
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, Predicate::Nearby { .. } | Predicate::Polygon { .. })
    }
}

fn default_page() -> usize {
    1
}

fn default_include_media() -> bool {
    true
}

/// A full query: predicate plus pagination, sort and media options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub predicate: Predicate,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    #[serde(default = "default_include_media")]
    pub include_media: bool,
}

impl QueryRequest {
    /// First page, no sort, media included.
    pub fn new(predicate: Predicate) -> Self {
        QueryRequest {
            predicate,
            page: 1,
            sort: None,
            include_media: true,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_media(mut self, include_media: bool) -> Self {
        self.include_media = include_media;
        self
    }

    /// Parse a request; malformed JSON is a client error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GeoSightError::invalid_query(format!("Malformed query request: {e}")))
    }
}
