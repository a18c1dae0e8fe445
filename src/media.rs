//! Media catalog and the resolver that attaches illustrative images to records.
//!
//! The catalog indexes image files in a separate media [`Storage`] by file
//! name and hands out opaque [`MediaRef`]s; records only ever hold refs,
//! the bytes are fetched at response time.

use std::sync::Arc;

use ahash::AHashMap;
use log::warn;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::category::{CategoryMap, DEFAULT_SHAPE_KEY, UNKNOWN_REGION_KEY};
use crate::error::Result;
use crate::storage::{Storage, read_all};

/// Opaque reference to a media blob in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    /// Derive the reference of a catalog key.
    fn for_key(key: &str) -> Self {
        MediaRef(format!("{:08x}", crc32fast::hash(key.as_bytes())))
    }

    /// The `n`th alternative for a key whose checksum is already taken.
    fn suffixed(&self, n: usize) -> Self {
        MediaRef(format!("{}-{n}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-to-reference index over the files of a media storage.
#[derive(Debug)]
pub struct MediaCatalog {
    storage: Option<Arc<dyn Storage>>,
    refs: AHashMap<String, MediaRef>,
    keys: AHashMap<MediaRef, String>,
}

impl MediaCatalog {
    /// A catalog with no entries; every lookup misses.
    pub fn empty() -> Self {
        MediaCatalog {
            storage: None,
            refs: AHashMap::new(),
            keys: AHashMap::new(),
        }
    }

    /// Index every file currently in `storage`. Keys are exact file names.
    ///
    /// Keys are visited in name order; a key whose checksum collides with an
    /// earlier one gets a numbered suffix, so every key keeps its own ref.
    pub fn from_storage(storage: Arc<dyn Storage>) -> Result<Self> {
        let mut refs = AHashMap::new();
        let mut keys: AHashMap<MediaRef, String> = AHashMap::new();

        let mut names = storage.list_files()?;
        names.sort();

        for name in names {
            if name.ends_with(".tmp") {
                continue;
            }
            let base = MediaRef::for_key(&name);
            let mut media_ref = base.clone();
            let mut n = 0;
            while let Some(existing) = keys.get(&media_ref) {
                n += 1;
                warn!("Media key {name} collides with {existing} on ref {base}");
                media_ref = base.suffixed(n);
            }
            keys.insert(media_ref.clone(), name.clone());
            refs.insert(name, media_ref);
        }

        Ok(MediaCatalog {
            storage: Some(storage),
            refs,
            keys,
        })
    }

    /// Exact-match lookup of a key.
    pub fn lookup(&self, key: &str) -> Option<&MediaRef> {
        self.refs.get(key)
    }

    /// The key a reference was issued for.
    pub fn key_of(&self, media_ref: &MediaRef) -> Option<&str> {
        self.keys.get(media_ref).map(String::as_str)
    }

    /// Fetch the bytes behind a reference. `None` for refs this catalog did
    /// not issue.
    pub fn fetch(&self, media_ref: &MediaRef) -> Result<Option<Vec<u8>>> {
        let (Some(storage), Some(key)) = (&self.storage, self.keys.get(media_ref)) else {
            return Ok(None);
        };

        read_all(storage.as_ref(), key).map(Some)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// References picked for one record. Either side may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub region: Option<MediaRef>,
    pub shape: Option<MediaRef>,
}

/// Maps a record's region code and shape category to media references.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    categories: Arc<CategoryMap>,
    catalog: Arc<MediaCatalog>,
}

impl MediaResolver {
    pub fn new(categories: Arc<CategoryMap>, catalog: Arc<MediaCatalog>) -> Self {
        MediaResolver {
            categories,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Arc<MediaCatalog> {
        &self.catalog
    }

    /// Resolve with the thread-local generator.
    pub fn resolve(&self, region_code: Option<&str>, shape: Option<&str>) -> ResolvedMedia {
        self.resolve_with_rng(region_code, shape, &mut rand::rng())
    }

    /// Resolve with a caller-supplied generator for the shape image draw.
    pub fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        region_code: Option<&str>,
        shape: Option<&str>,
        rng: &mut R,
    ) -> ResolvedMedia {
        let region_key = self.region_key(region_code);
        let shape_key = self.shape_key(shape, rng);

        ResolvedMedia {
            region: self.lookup_logged(region_key),
            shape: self.lookup_logged(shape_key),
        }
    }

    /// The catalog key for a region code, falling back to the unknown-region key.
    pub fn region_key(&self, region_code: Option<&str>) -> &str {
        region_code
            .and_then(|code| self.categories.region(code.trim()))
            .map(|entry| entry.image_key.as_str())
            .unwrap_or(UNKNOWN_REGION_KEY)
    }

    /// One key drawn uniformly from the shape's set, or the default key.
    pub fn shape_key<R: Rng + ?Sized>(&self, shape: Option<&str>, rng: &mut R) -> &str {
        shape
            .and_then(|shape| self.categories.shape_keys(shape.trim()))
            .and_then(|keys| keys.choose(rng))
            .map(String::as_str)
            .unwrap_or(DEFAULT_SHAPE_KEY)
    }

    fn lookup_logged(&self, key: &str) -> Option<MediaRef> {
        let found = self.catalog.lookup(key).cloned();
        if found.is_none() {
            warn!("Media key '{key}' not in catalog, leaving reference unset");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn catalog_with(names: &[&str]) -> Arc<MediaCatalog> {
        let storage = MemoryStorage::new();
        for name in names {
            storage.put(name, name.as_bytes());
        }
        Arc::new(MediaCatalog::from_storage(Arc::new(storage)).unwrap())
    }

    fn resolver(names: &[&str]) -> MediaResolver {
        MediaResolver::new(Arc::new(CategoryMap::default()), catalog_with(names))
    }

    #[test]
    fn test_region_keys() {
        let resolver = resolver(&[]);
        assert_eq!(resolver.region_key(Some("ny")), "ny.jpg");
        assert_eq!(resolver.region_key(Some("NY")), "ny.jpg");
        assert_eq!(resolver.region_key(Some("zz")), "unknown_state.jpg");
        assert_eq!(resolver.region_key(None), "unknown_state.jpg");
    }

    #[test]
    fn test_shape_keys() {
        let resolver = resolver(&[]);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(resolver.shape_key(Some("blob"), &mut rng), "default.jpg");
        assert_eq!(resolver.shape_key(None, &mut rng), "default.jpg");

        let allowed = ["disk_a.jpg", "disk_b.jpg", "disk_c.jpg"];
        for _ in 0..50 {
            let key = resolver.shape_key(Some("Disk"), &mut rng);
            assert!(allowed.contains(&key), "unexpected key {key}");
        }
    }

    #[test]
    fn test_resolve_against_catalog() {
        let resolver = resolver(&[
            "ny.jpg",
            "unknown_state.jpg",
            "default.jpg",
            "disk_a.jpg",
            "disk_b.jpg",
            "disk_c.jpg",
        ]);
        let catalog = Arc::clone(resolver.catalog());

        let media = resolver.resolve(Some("ny"), Some("disk"));
        assert_eq!(catalog.key_of(media.region.as_ref().unwrap()), Some("ny.jpg"));
        let shape_key = catalog.key_of(media.shape.as_ref().unwrap()).unwrap();
        assert!(shape_key.starts_with("disk_"));

        let media = resolver.resolve(Some("zz"), Some("unknown"));
        assert_eq!(
            catalog.key_of(media.region.as_ref().unwrap()),
            Some("unknown_state.jpg")
        );
        assert_eq!(
            catalog.key_of(media.shape.as_ref().unwrap()),
            Some("default.jpg")
        );
    }

    #[test]
    fn test_missing_catalog_entries_degrade_independently() {
        let resolver = resolver(&["ny.jpg"]);

        let media = resolver.resolve(Some("ny"), Some("disk"));
        assert!(media.region.is_some());
        assert!(media.shape.is_none());

        let empty = MediaResolver::new(
            Arc::new(CategoryMap::default()),
            Arc::new(MediaCatalog::empty()),
        );
        assert_eq!(empty.resolve(Some("ny"), Some("disk")), ResolvedMedia::default());
    }

    #[test]
    fn test_fetch_bytes() {
        let catalog = catalog_with(&["ny.jpg"]);
        let media_ref = catalog.lookup("ny.jpg").unwrap().clone();

        assert_eq!(catalog.fetch(&media_ref).unwrap(), Some(b"ny.jpg".to_vec()));
        assert_eq!(media_ref.as_str().len(), 8);

        let foreign = MediaRef::for_key("elsewhere.jpg");
        assert_eq!(catalog.fetch(&foreign).unwrap(), None);
    }

    #[test]
    fn test_colliding_keys_keep_their_own_bytes() {
        // Both names hash to crc32 4ddb0c25.
        assert_eq!(MediaRef::for_key("plumless"), MediaRef::for_key("buckeroo"));

        let catalog = catalog_with(&["plumless", "buckeroo"]);
        assert_eq!(catalog.len(), 2);

        let first = catalog.lookup("buckeroo").unwrap().clone();
        let second = catalog.lookup("plumless").unwrap().clone();
        assert_eq!(first.as_str(), "4ddb0c25");
        assert_eq!(second.as_str(), "4ddb0c25-1");

        assert_eq!(catalog.key_of(&second), Some("plumless"));
        assert_eq!(catalog.fetch(&first).unwrap(), Some(b"buckeroo".to_vec()));
        assert_eq!(catalog.fetch(&second).unwrap(), Some(b"plumless".to_vec()));
    }
}
