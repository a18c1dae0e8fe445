//! Query surface: request contract, execution, pagination and responses.
//!
//! A request carries exactly one [`Predicate`]; the [`QueryEngine`] resolves
//! it to an ordered match list, applies an optional sort and cuts the
//! requested page.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geosight::media::MediaCatalog;
//! use geosight::query::{Predicate, QueryEngine, QueryRequest};
//! use geosight::spatial::SpatialBackend;
//! use geosight::storage::{MemoryStorage, Storage};
//! use geosight::store::{RecordField, SightingStore};
//!
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! let store = Arc::new(SightingStore::open(storage, SpatialBackend::Rtree)?);
//! let engine = QueryEngine::new(store, Arc::new(MediaCatalog::empty()));
//!
//! let request = QueryRequest::new(Predicate::Equals {
//!     field: RecordField::Region,
//!     value: "ny".to_string(),
//! });
//! let response = engine.execute(&request)?;
//! println!("{} matches", response.total);
//! # Ok::<(), geosight::error::GeoSightError>(())
//! ```

pub mod engine;
pub mod page;
pub mod request;
pub mod response;

pub use engine::{QueryEngine, QueryMatch};
pub use page::{Page, PageRequest, SortColumn, SortDirection, SortSpec, SortState};
pub use request::{Predicate, QueryRequest, TextScope};
pub use response::{QueryResponse, RecordView};
