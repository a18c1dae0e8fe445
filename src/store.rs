//! The geo-indexed sighting collection.
//!
//! [`SightingStore`] owns the materialized records, the equality indexes,
//! the spatial index and their persisted form in a [`Storage`]:
//!
//! - `records.jsonl`: one [`IndexedRecord`] per line, in collection order.
//! - `manifest.json`: record count, CRC32 of the records file, build id,
//!   build timestamp, spatial backend and whether the last rebuild completed.
//! - `locations.jsonl`: the point table of the stored spatial backend.
//!
//! Queries share a read lock through [`CollectionReader`]; the builder takes
//! the write lock once per stage.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GeoSightError, Result};
use crate::geo::GeoPoint;
use crate::record::IndexedRecord;
use crate::spatial::{SpatialBackend, SpatialIndex, StoredSpatialIndex};
use crate::storage::{Storage, read_all, write_atomic};

/// Name of the persisted records file.
pub const RECORDS_FILE: &str = "records.jsonl";

/// Name of the persisted manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Categorical record fields usable in equality queries and distinct listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    #[serde(alias = "state")]
    Region,
    #[serde(alias = "city")]
    SubRegion,
    Country,
    Shape,
}

impl RecordField {
    pub const ALL: [RecordField; 4] = [
        RecordField::Region,
        RecordField::SubRegion,
        RecordField::Country,
        RecordField::Shape,
    ];

    /// Fields that carry an equality index.
    const INDEXED: [RecordField; 3] = [
        RecordField::Region,
        RecordField::SubRegion,
        RecordField::Country,
    ];

    /// The field's value on `record`, if any.
    pub fn value<'a>(&self, record: &'a IndexedRecord) -> Option<&'a str> {
        match self {
            RecordField::Region => record.region_code.as_deref(),
            RecordField::SubRegion => Some(record.sub_region.as_str()),
            RecordField::Country => record.country.as_deref(),
            RecordField::Shape => record.shape_category.as_deref(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Region => "region",
            RecordField::SubRegion => "sub_region",
            RecordField::Country => "country",
            RecordField::Shape => "shape",
        }
    }
}

impl std::str::FromStr for RecordField {
    type Err = GeoSightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "region" | "state" => Ok(RecordField::Region),
            "sub_region" | "city" => Ok(RecordField::SubRegion),
            "country" => Ok(RecordField::Country),
            "shape" => Ok(RecordField::Shape),
            other => Err(GeoSightError::invalid_query(format!(
                "Unknown field: {other} (expected region, sub_region, country or shape)"
            ))),
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted description of the collection's last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// `false` between the first persist of a rebuild and its final stage.
    pub complete: bool,
    pub record_count: usize,
    pub records_crc32: u32,
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub backend: SpatialBackend,
}

/// Collection summary for operators.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub record_count: usize,
    pub located_count: usize,
    pub spatial_backend: SpatialBackend,
    pub spatial_ready: bool,
    pub manifest: Option<Manifest>,
}

type EqualityIndex = AHashMap<String, Vec<usize>>;

#[derive(Debug, Default)]
struct CollectionState {
    records: Vec<IndexedRecord>,
    by_id: AHashMap<String, usize>,
    equality: AHashMap<RecordField, EqualityIndex>,
    spatial: Option<Arc<dyn SpatialIndex>>,
    manifest: Option<Manifest>,
}

impl CollectionState {
    fn rebuild_id_map(&mut self) {
        self.by_id = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id.clone(), position))
            .collect();
    }

    fn rebuild_equality(&mut self) {
        self.equality.clear();
        for field in RecordField::INDEXED {
            let mut index = EqualityIndex::new();
            for (position, record) in self.records.iter().enumerate() {
                if let Some(value) = field.value(record) {
                    index.entry(value.to_lowercase()).or_default().push(position);
                }
            }
            self.equality.insert(field, index);
        }
    }

    fn locations(&self) -> Vec<(usize, GeoPoint)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(position, record)| record.location.map(|point| (position, point)))
            .collect()
    }
}

/// The indexed collection plus its persisted form.
#[derive(Debug)]
pub struct SightingStore {
    storage: Arc<dyn Storage>,
    backend: SpatialBackend,
    state: RwLock<CollectionState>,
}

impl SightingStore {
    /// Open the collection persisted in `storage`.
    ///
    /// The spatial index is opened with the backend recorded in the manifest;
    /// `backend` applies to the next rebuild. Without a manifest the
    /// collection is empty. With an incomplete
    /// manifest the records load but spatial queries stay unavailable until
    /// the next full rebuild. A records file that does not match its
    /// manifest is a storage error.
    pub fn open(storage: Arc<dyn Storage>, backend: SpatialBackend) -> Result<Self> {
        let store = Self::create(storage, backend);
        store.load()?;
        Ok(store)
    }

    /// An empty collection over `storage` that does not read what the storage
    /// already holds. Used to rebuild a collection that no longer opens.
    pub fn create(storage: Arc<dyn Storage>, backend: SpatialBackend) -> Self {
        SightingStore {
            storage,
            backend,
            state: RwLock::new(CollectionState::default()),
        }
    }

    fn load(&self) -> Result<()> {
        if !self.storage.file_exists(MANIFEST_FILE) {
            debug!("No {MANIFEST_FILE}, starting with an empty collection");
            return Ok(());
        }

        let manifest: Manifest =
            serde_json::from_slice(&read_all(self.storage.as_ref(), MANIFEST_FILE)?)?;
        let bytes = read_all(self.storage.as_ref(), RECORDS_FILE)?;

        let crc = crc32fast::hash(&bytes);
        if crc != manifest.records_crc32 {
            return Err(GeoSightError::storage(format!(
                "{RECORDS_FILE} checksum {crc:08x} does not match manifest {:08x}",
                manifest.records_crc32
            )));
        }

        let mut records = Vec::with_capacity(manifest.record_count);
        for line in bytes.split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            records.push(serde_json::from_slice::<IndexedRecord>(line)?);
        }
        if records.len() != manifest.record_count {
            return Err(GeoSightError::storage(format!(
                "{RECORDS_FILE} holds {} records, manifest expects {}",
                records.len(),
                manifest.record_count
            )));
        }

        let mut state = self.state.write();
        state.records = records;
        state.rebuild_id_map();
        state.rebuild_equality();

        if manifest.complete {
            if manifest.backend != self.backend {
                info!(
                    "Collection was built with the {} backend, serving it from that; \
                     the next rebuild switches to {}",
                    manifest.backend, self.backend
                );
            }
            let locations = state.locations();
            match manifest.backend.open(&locations, &self.storage) {
                Ok(spatial) => state.spatial = Some(spatial),
                Err(GeoSightError::IndexUnavailable(msg)) => {
                    warn!("Spatial index not available ({msg}), rerun the rebuild");
                }
                Err(e) => return Err(e),
            }
        } else {
            warn!(
                "Last rebuild {} did not complete, spatial queries unavailable",
                manifest.build_id
            );
        }

        info!(
            "Opened collection: {} records, build {}",
            state.records.len(),
            manifest.build_id
        );
        state.manifest = Some(manifest);
        Ok(())
    }

    /// The backend the next rebuild builds with.
    pub fn backend(&self) -> SpatialBackend {
        self.backend
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Take a shared read view for the duration of a query.
    pub fn reader(&self) -> CollectionReader<'_> {
        CollectionReader {
            state: self.state.read(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the record with `id`.
    pub fn get(&self, id: &str) -> Option<IndexedRecord> {
        let state = self.state.read();
        state.by_id.get(id).map(|&position| state.records[position].clone())
    }

    pub fn manifest(&self) -> Option<Manifest> {
        self.state.read().manifest.clone()
    }

    pub fn stats(&self) -> CollectionStats {
        let state = self.state.read();
        CollectionStats {
            record_count: state.records.len(),
            located_count: state.records.iter().filter(|r| r.location.is_some()).count(),
            spatial_backend: state.manifest.as_ref().map_or(self.backend, |m| m.backend),
            spatial_ready: state.spatial.is_some(),
            manifest: state.manifest.clone(),
        }
    }

    /// Append a comment to a record and persist the collection.
    pub fn append_comment(&self, id: &str, comment: &str) -> Result<()> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(GeoSightError::invalid_query("Comment must not be empty"));
        }

        let mut state = self.state.write();
        let position = *state
            .by_id
            .get(id)
            .ok_or_else(|| GeoSightError::not_found(format!("No record with id '{id}'")))?;

        state.records[position].user_comments.push(comment.to_string());

        let (complete, build_id, built_at, backend) = match &state.manifest {
            Some(m) => (m.complete, m.build_id, m.built_at, m.backend),
            None => (false, Uuid::new_v4(), Utc::now(), self.backend),
        };
        let manifest =
            self.write_collection(&state.records, complete, build_id, built_at, backend)?;
        state.manifest = Some(manifest);

        debug!("Appended comment to record {id}");
        Ok(())
    }

    /// Sorted distinct non-empty values of a categorical field.
    pub fn distinct_values(&self, field: RecordField) -> Vec<String> {
        let state = self.state.read();
        state
            .records
            .iter()
            .filter_map(|record| field.value(record))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Drop every record, index and persisted file.
    pub(crate) fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        *state = CollectionState::default();

        self.storage.delete_file(MANIFEST_FILE)?;
        self.storage.delete_file(RECORDS_FILE)?;
        StoredSpatialIndex::remove(self.storage.as_ref())?;
        Ok(())
    }

    /// Install freshly materialized records and persist them with an
    /// incomplete manifest.
    pub(crate) fn install(&self, records: Vec<IndexedRecord>, build_id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        state.records = records;
        state.rebuild_id_map();
        state.spatial = None;

        let manifest =
            self.write_collection(&state.records, false, build_id, Utc::now(), self.backend)?;
        state.manifest = Some(manifest);
        Ok(())
    }

    /// Build the spatial and equality indexes; returns the located count.
    pub(crate) fn build_indexes(&self) -> Result<usize> {
        let mut state = self.state.write();
        let locations = state.locations();
        let spatial = self.backend.build(&locations, &self.storage)?;

        state.rebuild_equality();
        state.spatial = Some(spatial);
        Ok(locations.len())
    }

    /// Mutate the records in place under the write lock.
    pub(crate) fn update_records<F>(&self, update: F)
    where
        F: FnOnce(&mut [IndexedRecord]),
    {
        let mut state = self.state.write();
        update(&mut state.records);
    }

    /// Persist the records with a complete manifest.
    pub(crate) fn commit(&self, build_id: Uuid) -> Result<Manifest> {
        let mut state = self.state.write();
        match self.write_collection(&state.records, true, build_id, Utc::now(), self.backend) {
            Ok(manifest) => {
                state.manifest = Some(manifest.clone());
                Ok(manifest)
            }
            Err(e) => {
                // The persisted manifest still says incomplete.
                state.spatial = None;
                Err(e)
            }
        }
    }

    fn write_collection(
        &self,
        records: &[IndexedRecord],
        complete: bool,
        build_id: Uuid,
        built_at: DateTime<Utc>,
        backend: SpatialBackend,
    ) -> Result<Manifest> {
        let mut buffer = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let manifest = Manifest {
            complete,
            record_count: records.len(),
            records_crc32: crc32fast::hash(&buffer),
            build_id,
            built_at,
            backend,
        };

        write_atomic(self.storage.as_ref(), RECORDS_FILE, &buffer)?;
        write_atomic(
            self.storage.as_ref(),
            MANIFEST_FILE,
            &serde_json::to_vec_pretty(&manifest)?,
        )?;
        self.storage.sync()?;

        Ok(manifest)
    }
}

/// Shared read view over the collection.
pub struct CollectionReader<'a> {
    state: RwLockReadGuard<'a, CollectionState>,
}

impl CollectionReader<'_> {
    /// All records in collection order.
    pub fn records(&self) -> &[IndexedRecord] {
        &self.state.records
    }

    pub fn record(&self, position: usize) -> Option<&IndexedRecord> {
        self.state.records.get(position)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.state.by_id.get(id).copied()
    }

    /// The spatial index, or `IndexUnavailable` when it is not built.
    pub fn spatial(&self) -> Result<&dyn SpatialIndex> {
        self.state.spatial.as_deref().ok_or_else(|| {
            GeoSightError::index_unavailable("Spatial index is not built, run a full rebuild")
        })
    }

    /// Positions whose `field` equals `value` case-insensitively, in
    /// collection order.
    pub fn equal_positions(&self, field: RecordField, value: &str) -> Vec<usize> {
        let key = value.to_lowercase();

        if let Some(index) = self.state.equality.get(&field) {
            return index.get(&key).cloned().unwrap_or_default();
        }

        self.state
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| field.value(record).is_some_and(|v| v.to_lowercase() == key))
            .map(|(position, _)| position)
            .collect()
    }
}
