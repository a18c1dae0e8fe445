//! Error types for the GeoSight library.
//!
//! All errors are represented by the [`GeoSightError`] enum. Variants are
//! split along the boundary the query surface cares about: malformed caller
//! input and unknown ids are client errors, everything else (missing spatial
//! index, storage or serialization failures) is a server error.
//!
//! # Examples
//!
//! ```
//! use geosight::error::{GeoSightError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(GeoSightError::invalid_query("radius must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => assert!(e.is_client_error()),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for GeoSight operations.
#[derive(Error, Debug)]
pub enum GeoSightError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed query input (bad coordinates, radius, ring, field name, page).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A record id that does not exist in the indexed collection.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The spatial index is missing or the last rebuild did not complete.
    #[error("Spatial index unavailable: {0}")]
    IndexUnavailable(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV decoding errors from the raw collection reader
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with GeoSightError.
pub type Result<T> = std::result::Result<T, GeoSightError>;

impl GeoSightError {
    /// Create a new invalid query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        GeoSightError::InvalidQuery(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        GeoSightError::NotFound(msg.into())
    }

    /// Create a new index unavailable error.
    pub fn index_unavailable<S: Into<String>>(msg: S) -> Self {
        GeoSightError::IndexUnavailable(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        GeoSightError::Storage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GeoSightError::Config(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GeoSightError::Other(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        GeoSightError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Whether this error should be reported to the caller as a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GeoSightError::InvalidQuery(_) | GeoSightError::NotFound(_)
        )
    }
}
