//! Geo-index builder: the batch pass from raw records to the indexed collection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashSet;
use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{GeoSightError, Result};
use crate::media::MediaResolver;
use crate::normalize::{CoordinatePolicy, normalize_coordinates};
use crate::record::{IndexedRecord, RawRecord};
use crate::spatial::SpatialBackend;
use crate::store::SightingStore;

/// Result of a rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub build_id: Uuid,

    /// Number of indexed records, always equal to the raw record count.
    pub total_records: usize,

    /// Records with a non-null location.
    pub located_records: usize,

    /// Records whose region image reference was set.
    pub region_refs_set: usize,

    /// Records whose shape image reference was set.
    pub shape_refs_set: usize,

    pub backend: SpatialBackend,

    /// Total execution time.
    pub execution_time: Duration,
}

/// Rebuilds a [`SightingStore`] from a full raw collection.
///
/// Every rebuild starts from scratch. A failure after the clear stage
/// leaves the collection without spatial queryability until a full rerun.
pub struct GeoIndexBuilder {
    store: Arc<SightingStore>,
    resolver: MediaResolver,
    policy: CoordinatePolicy,
    thread_pool: Arc<ThreadPool>,
}

impl GeoIndexBuilder {
    /// Create a builder; `thread_pool_size` defaults to the number of CPUs.
    pub fn new(
        store: Arc<SightingStore>,
        resolver: MediaResolver,
        policy: CoordinatePolicy,
        thread_pool_size: Option<usize>,
    ) -> Result<Self> {
        let thread_pool_size = thread_pool_size.unwrap_or_else(num_cpus::get);

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(thread_pool_size)
            .thread_name(|i| format!("geo-index-{i}"))
            .build()
            .map_err(|e| GeoSightError::internal(format!("Failed to create thread pool: {e}")))?;

        Ok(GeoIndexBuilder {
            store,
            resolver,
            policy,
            thread_pool: Arc::new(thread_pool),
        })
    }

    pub fn store(&self) -> &Arc<SightingStore> {
        &self.store
    }

    /// Run every stage over `raw`: clear, materialize, index, annotate.
    pub fn rebuild(&self, raw: &[RawRecord]) -> Result<BuildReport> {
        let started = Instant::now();
        let build_id = Uuid::new_v4();
        info!(
            "Starting rebuild {build_id} over {} raw records ({} backend)",
            raw.len(),
            self.store.backend()
        );

        warn_duplicate_ids(raw);

        self.store.clear()?;
        info!("Cleared previous collection");

        let policy = self.policy;
        let records = self.thread_pool.install(|| materialize(raw, policy));
        let total_records = records.len();
        self.store.install(records, build_id)?;
        info!("Materialized {total_records} records");

        let located_records = self.store.build_indexes()?;
        info!(
            "Indexed {located_records} located records, {} without location",
            total_records - located_records
        );

        let (region_refs_set, shape_refs_set) = self.annotate();
        info!("Attached {region_refs_set} region and {shape_refs_set} shape image references");

        let manifest = self.store.commit(build_id)?;

        let report = BuildReport {
            build_id,
            total_records,
            located_records,
            region_refs_set,
            shape_refs_set,
            backend: manifest.backend,
            execution_time: started.elapsed(),
        };
        info!(
            "Rebuild {build_id} complete in {:?} (records crc32 {:08x})",
            report.execution_time, manifest.records_crc32
        );

        Ok(report)
    }

    /// Attach media references to every record; returns how many region and
    /// shape references were set.
    fn annotate(&self) -> (usize, usize) {
        let resolver = &self.resolver;
        let mut counts = (0, 0);

        self.store.update_records(|records| {
            counts = self.thread_pool.install(|| {
                records
                    .par_iter_mut()
                    .map(|record| {
                        let media = resolver.resolve(
                            record.region_code.as_deref(),
                            record.shape_category.as_deref(),
                        );
                        record.region_image_ref = media.region;
                        record.shape_image_ref = media.shape;
                        (
                            usize::from(record.region_image_ref.is_some()),
                            usize::from(record.shape_image_ref.is_some()),
                        )
                    })
                    .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
            });
        });

        counts
    }
}

/// One indexed record per raw record, in input order.
pub fn materialize(raw: &[RawRecord], policy: CoordinatePolicy) -> Vec<IndexedRecord> {
    raw.par_iter()
        .map(|record| {
            let location =
                normalize_coordinates(&record.longitude_text, &record.latitude_text, policy);
            IndexedRecord::from_raw(record, location)
        })
        .collect()
}

fn warn_duplicate_ids(raw: &[RawRecord]) {
    let mut seen = AHashSet::with_capacity(raw.len());
    let duplicates = raw.iter().filter(|r| !seen.insert(r.id.as_str())).count();
    if duplicates > 0 {
        warn!("{duplicates} raw records share an id with an earlier record; lookups by id return the last one");
    }
}
