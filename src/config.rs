//! Configuration for collections, query paging and rebuilds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::category::CategoryMap;
use crate::error::{GeoSightError, Result};
use crate::media::MediaCatalog;
use crate::normalize::CoordinatePolicy;
use crate::query::page::DEFAULT_PAGE_SIZE;
use crate::spatial::SpatialBackend;
use crate::storage::{FileStorage, Storage, StorageConfig};
use crate::store::SightingStore;

/// Top-level configuration, loadable from a JSON file.
///
/// Every field has a default, so a file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSightConfig {
    /// Records per query page.
    pub page_size: usize,

    /// Handling of parseable but out-of-range coordinates.
    pub coordinate_policy: CoordinatePolicy,

    /// Spatial index implementation.
    pub spatial_backend: SpatialBackend,

    /// Directory of the indexed collection.
    pub data_dir: PathBuf,

    /// Directory of the media catalog images.
    pub media_dir: PathBuf,

    /// Optional JSON file replacing the built-in category tables.
    pub category_map: Option<PathBuf>,

    /// Rebuild worker threads (default: number of CPUs).
    pub thread_pool_size: Option<usize>,

    /// Buffering of the file storages.
    #[serde(skip)]
    pub storage: StorageConfig,
}

impl Default for GeoSightConfig {
    fn default() -> Self {
        GeoSightConfig {
            page_size: DEFAULT_PAGE_SIZE,
            coordinate_policy: CoordinatePolicy::default(),
            spatial_backend: SpatialBackend::default(),
            data_dir: PathBuf::from("geosight-data"),
            media_dir: PathBuf::from("media"),
            category_map: None,
            thread_pool_size: None,
            storage: StorageConfig::default(),
        }
    }
}

impl GeoSightConfig {
    /// Load a configuration file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            GeoSightError::config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        let config: GeoSightConfig = serde_json::from_slice(&bytes).map_err(|e| {
            GeoSightError::config(format!("Invalid config {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(GeoSightError::config("page_size must be at least 1"));
        }

        if self.thread_pool_size == Some(0) {
            return Err(GeoSightError::config("thread_pool_size must be at least 1"));
        }

        Ok(())
    }

    /// The category tables: the configured file, or the built-in default.
    pub fn categories(&self) -> Result<CategoryMap> {
        match &self.category_map {
            Some(path) => CategoryMap::from_json_file(path),
            None => Ok(CategoryMap::default()),
        }
    }

    /// File storage of the indexed collection.
    pub fn data_storage(&self) -> Result<Arc<dyn Storage>> {
        Ok(Arc::new(FileStorage::new(&self.data_dir, self.storage.clone())?))
    }

    /// Catalog over the media directory; empty when the directory is absent.
    pub fn media_catalog(&self) -> Result<MediaCatalog> {
        if !self.media_dir.is_dir() {
            log::warn!(
                "Media directory {} not found, image references will be unset",
                self.media_dir.display()
            );
            return Ok(MediaCatalog::empty());
        }

        let storage = FileStorage::new(&self.media_dir, self.storage.clone())?;
        MediaCatalog::from_storage(Arc::new(storage))
    }

    /// Open the collection under `data_dir`.
    pub fn open_store(&self) -> Result<SightingStore> {
        SightingStore::open(self.data_storage()?, self.spatial_backend)
    }
}
