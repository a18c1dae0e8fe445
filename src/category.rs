//! Fixed category tables used to pick illustrative media.
//!
//! Two tables: region code to region image key, and shape category to the
//! set of shape image keys. They are configuration loaded once at startup
//! and handed to the [`MediaResolver`](crate::media::MediaResolver).

use std::collections::HashMap;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GeoSightError, Result};

/// Image key used when a region code is absent from the region table.
pub const UNKNOWN_REGION_KEY: &str = "unknown_state.jpg";

/// Image key used when a shape category is absent from the shape table.
pub const DEFAULT_SHAPE_KEY: &str = "default.jpg";

const IMAGE_EXTENSION: &str = "jpg";

const REGIONS: &[(&str, &str)] = &[
    ("al", "alabama"),
    ("ak", "alaska"),
    ("az", "arizona"),
    ("ar", "arkansas"),
    ("ca", "california"),
    ("co", "colorado"),
    ("ct", "connecticut"),
    ("de", "delaware"),
    ("fl", "florida"),
    ("ga", "georgia"),
    ("hi", "hawaiian-islands"),
    ("id", "idaho"),
    ("il", "illinois"),
    ("in", "indiana"),
    ("ia", "iowa"),
    ("ks", "kansas"),
    ("ky", "kentucky"),
    ("la", "louisiana"),
    ("me", "maine"),
    ("md", "maryland"),
    ("ma", "massachusetts"),
    ("mi", "michigan"),
    ("mn", "minnesota"),
    ("ms", "mississippi"),
    ("mo", "missouri"),
    ("mt", "montana"),
    ("ne", "nebraska"),
    ("nv", "nevada"),
    ("nh", "new-hampshire"),
    ("nj", "new-jersey"),
    ("nm", "new-mexico"),
    ("ny", "new-york"),
    ("nc", "north-carolina"),
    ("nd", "north-dakota"),
    ("oh", "ohio"),
    ("ok", "oklahoma"),
    ("or", "oregon"),
    ("pa", "pennsylvania"),
    ("ri", "rhode-island"),
    ("sc", "south-carolina"),
    ("sd", "south-dakota"),
    ("tn", "tennessee"),
    ("tx", "texas"),
    ("ut", "utah"),
    ("vt", "vermont"),
    ("va", "virginia"),
    ("wa", "washington"),
    ("wv", "west-virginia"),
    ("wi", "wisconsin"),
    ("wy", "wyoming"),
    ("pr", "puerto-rico"),
];

const SHAPES: &[(&str, &[&str])] = &[
    ("chevron", &["chevron_a", "chevron_b"]),
    ("cigar", &["cigar_a", "cigar_b", "cigar_c"]),
    ("cone", &["cone_a"]),
    ("crescent", &["crescent_a", "crescent_b"]),
    ("cross", &["cross_a"]),
    ("cylinder", &["cylinder_a", "cylinder_b", "cylinder_c"]),
    ("disk", &["disk_a", "disk_b", "disk_c"]),
    ("dome", &["dome_a", "dome_b", "dome_c"]),
    ("pyramid", &["pyramid_a", "pyramid_b"]),
    ("sphere", &["sphere_a", "sphere_b", "sphere_c"]),
    ("triangle", &["triangle_a", "triangle_b", "triangle_c"]),
];

/// A region known to the region table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry {
    /// Human-readable region name.
    pub name: String,
    /// Media catalog key of the region image.
    pub image_key: String,
}

/// The two read-only lookup tables.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    regions: AHashMap<String, RegionEntry>,
    shapes: AHashMap<String, Vec<String>>,
}

/// On-disk form of a category map file.
#[derive(Debug, Deserialize)]
struct CategoryMapFile {
    regions: HashMap<String, RegionEntry>,
    shapes: HashMap<String, Vec<String>>,
}

impl Default for CategoryMap {
    /// US states plus Puerto Rico, and eleven craft shapes.
    fn default() -> Self {
        let regions = REGIONS
            .iter()
            .map(|(code, name)| {
                (
                    code.to_string(),
                    RegionEntry {
                        name: name.to_string(),
                        image_key: format!("{code}.{IMAGE_EXTENSION}"),
                    },
                )
            })
            .collect();

        let shapes = SHAPES
            .iter()
            .map(|(shape, keys)| {
                (
                    shape.to_string(),
                    keys.iter()
                        .map(|key| format!("{key}.{IMAGE_EXTENSION}"))
                        .collect(),
                )
            })
            .collect();

        CategoryMap { regions, shapes }
    }
}

impl CategoryMap {
    /// Build a map from explicit tables. Keys are lowercased; shapes with
    /// an empty key set are rejected.
    pub fn new(
        regions: impl IntoIterator<Item = (String, RegionEntry)>,
        shapes: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Result<Self> {
        let regions = regions
            .into_iter()
            .map(|(code, entry)| (code.to_lowercase(), entry))
            .collect();

        let mut shape_table = AHashMap::new();
        for (shape, keys) in shapes {
            if keys.is_empty() {
                return Err(GeoSightError::config(format!(
                    "Shape '{shape}' has no image keys"
                )));
            }
            shape_table.insert(shape.to_lowercase(), keys);
        }

        Ok(CategoryMap {
            regions,
            shapes: shape_table,
        })
    }

    /// Load a map from a JSON file of the form
    /// `{"regions": {"ny": {"name": .., "image_key": ..}}, "shapes": {"disk": [..]}}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let file: CategoryMapFile = serde_json::from_slice(&bytes)?;
        Self::new(file.regions, file.shapes)
    }

    /// Look up a region by code, case-insensitively.
    pub fn region(&self, code: &str) -> Option<&RegionEntry> {
        self.regions.get(&code.to_lowercase())
    }

    /// Look up the image keys of a shape category, case-insensitively.
    pub fn shape_keys(&self, shape: &str) -> Option<&[String]> {
        self.shapes.get(&shape.to_lowercase()).map(Vec::as_slice)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}
