//! Command line argument parsing for the GeoSight CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::geo::DistanceUnit;
use crate::normalize::CoordinatePolicy;
use crate::query::page::SortColumn;
use crate::spatial::SpatialBackend;
use crate::store::RecordField;

/// GeoSight - geospatial indexing and queries over sighting reports
#[derive(Parser, Debug, Clone)]
#[command(name = "geosight")]
#[command(about = "Geospatial indexing and queries over sighting reports")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct GeoSightArgs {
    /// Configuration file (JSON)
    #[arg(short, long, global = true, env = "GEOSIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of the indexed collection (overrides the config file)
    #[arg(long, global = true, env = "GEOSIGHT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory of the media images (overrides the config file)
    #[arg(long, global = true, env = "GEOSIGHT_MEDIA_DIR")]
    pub media_dir: Option<PathBuf>,

    /// Spatial index backend: rtree or stored (overrides the config file)
    #[arg(long, global = true)]
    pub backend: Option<SpatialBackend>,

    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl GeoSightArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rebuild the indexed collection from a raw export
    Rebuild(RebuildArgs),

    /// Records within a radius of a point
    Nearby(NearbyArgs),

    /// Records inside a polygon ring
    Polygon(PolygonArgs),

    /// Records whose field equals a value
    Equals(EqualsArgs),

    /// Records whose text contains a token
    Text(TextArgs),

    /// Run a raw JSON query request
    Query(QueryArgs),

    /// Distinct values of a field
    Distinct(DistinctArgs),

    /// Append a comment to a record
    Comment(CommentArgs),

    /// Show one record with its media
    Show(ShowArgs),

    /// Show collection statistics
    Stats,
}

/// Arguments for rebuilding the collection
#[derive(Args, Debug, Clone)]
pub struct RebuildArgs {
    /// Raw collection export (CSV, or JSON Lines with a .jsonl extension)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Handling of out-of-range coordinates (overrides the config file)
    #[arg(long)]
    pub coordinate_policy: Option<CoordinatePolicy>,

    /// Number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// CSV delimiter character
    #[arg(long, default_value = ",")]
    pub delimiter: char,
}

/// Paging, sorting and media options shared by the query commands
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Column to sort by
    #[arg(short, long)]
    pub sort: Option<SortColumn>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Leave media out of the results
    #[arg(long)]
    pub no_media: bool,
}

/// Arguments for a radius query
#[derive(Args, Debug, Clone)]
pub struct NearbyArgs {
    /// Center latitude
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Center longitude
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Search radius
    #[arg(short, long)]
    pub radius: f64,

    /// Radius unit: m, km or mi
    #[arg(short, long, default_value = "miles")]
    pub unit: DistanceUnit,

    #[command(flatten)]
    pub paging: PageArgs,
}

/// Arguments for a polygon query
#[derive(Args, Debug, Clone)]
pub struct PolygonArgs {
    /// Closed ring as a JSON array of [lon, lat] pairs
    #[arg(value_name = "RING", allow_hyphen_values = true)]
    pub ring: String,

    #[command(flatten)]
    pub paging: PageArgs,
}

/// Arguments for an equality query
#[derive(Args, Debug, Clone)]
pub struct EqualsArgs {
    /// Field: region, sub_region, country or shape
    #[arg(value_name = "FIELD")]
    pub field: RecordField,

    /// Value to match (case-insensitive)
    #[arg(value_name = "VALUE")]
    pub value: String,

    #[command(flatten)]
    pub paging: PageArgs,
}

/// Arguments for a text query
#[derive(Args, Debug, Clone)]
pub struct TextArgs {
    /// Token to search for (case-insensitive substring)
    #[arg(value_name = "TOKEN")]
    pub token: String,

    /// Also search sub-region, region and shape
    #[arg(short, long)]
    pub all: bool,

    #[command(flatten)]
    pub paging: PageArgs,
}

/// Arguments for a raw JSON query
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Query request JSON; read from stdin when omitted
    #[arg(value_name = "REQUEST")]
    pub request: Option<String>,
}

/// Arguments for listing distinct values
#[derive(Args, Debug, Clone)]
pub struct DistinctArgs {
    /// Field: region, sub_region, country or shape
    #[arg(value_name = "FIELD")]
    pub field: RecordField,
}

/// Arguments for appending a comment
#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    /// Record id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Comment text
    #[arg(value_name = "TEXT")]
    pub text: String,
}

/// Arguments for showing a record
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Record id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Leave media out
    #[arg(long)]
    pub no_media: bool,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_command() {
        let args = GeoSightArgs::try_parse_from([
            "geosight",
            "nearby",
            "--lat",
            "43.15",
            "--lon",
            "-77.6",
            "--radius",
            "5",
            "--unit",
            "km",
            "--page",
            "2",
        ])
        .unwrap();

        if let Command::Nearby(nearby) = args.command {
            assert_eq!(nearby.lat, 43.15);
            assert_eq!(nearby.lon, -77.6);
            assert_eq!(nearby.radius, 5.0);
            assert_eq!(nearby.unit, DistanceUnit::Kilometers);
            assert_eq!(nearby.paging.page, 2);
            assert!(nearby.paging.sort.is_none());
        } else {
            panic!("Expected Nearby command");
        }
    }

    #[test]
    fn test_equals_command_with_sort() {
        let args = GeoSightArgs::try_parse_from([
            "geosight", "equals", "state", "NY", "--sort", "city", "--desc", "--format", "json",
        ])
        .unwrap();

        assert_eq!(args.output_format, OutputFormat::Json);
        if let Command::Equals(equals) = args.command {
            assert_eq!(equals.field, RecordField::Region);
            assert_eq!(equals.value, "NY");
            assert_eq!(equals.paging.sort, Some(SortColumn::SubRegion));
            assert!(equals.paging.desc);
        } else {
            panic!("Expected Equals command");
        }
    }

    #[test]
    fn test_rebuild_command_with_globals() {
        let args = GeoSightArgs::try_parse_from([
            "geosight",
            "--data-dir",
            "/tmp/collection",
            "rebuild",
            "sightings.csv",
            "--coordinate-policy",
            "reject",
            "--backend",
            "stored",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/collection")));
        assert_eq!(args.backend, Some(SpatialBackend::Stored));
        assert_eq!(args.verbosity(), 2);
        if let Command::Rebuild(rebuild) = args.command {
            assert_eq!(rebuild.input, PathBuf::from("sightings.csv"));
            assert_eq!(rebuild.coordinate_policy, Some(CoordinatePolicy::Reject));
            assert_eq!(rebuild.delimiter, ',');
        } else {
            panic!("Expected Rebuild command");
        }
    }

    #[test]
    fn test_invalid_field_rejected() {
        assert!(GeoSightArgs::try_parse_from(["geosight", "distinct", "colour"]).is_err());
        assert!(GeoSightArgs::try_parse_from(["geosight", "text", "light", "--desc"]).is_err());
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let args = GeoSightArgs::try_parse_from(["geosight", "-v", "-q", "stats"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }
}
