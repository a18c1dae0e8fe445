//! Reader for the exported raw sightings collection.
//!
//! Two export formats are accepted: CSV with a header row, as in the public
//! sightings dump, and JSON Lines with one [`RawRecord`] object per line.
//!
//! ```csv
//! datetime,city,state,country,shape,duration (seconds),comments,latitude,longitude
//! 10/10/1949 20:30,san marcos,tx,us,cylinder,2700,This event took place in early fall,29.8830556,-97.9411111
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use log::{info, warn};

use crate::error::{GeoSightError, Result};
use crate::record::RawRecord;

/// Which [`RawRecord`] field a CSV column feeds.
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Id,
    Region,
    SubRegion,
    Country,
    Shape,
    Longitude,
    Latitude,
    FreeText,
    Reporter,
    Attribute(String),
}

impl Column {
    fn from_header(header: &str) -> Self {
        let name = header.trim();
        match name.to_ascii_lowercase().as_str() {
            "id" | "_id" => Column::Id,
            "state" | "region" | "region_code" => Column::Region,
            "city" | "sub_region" => Column::SubRegion,
            "country" => Column::Country,
            "shape" | "shape_category" => Column::Shape,
            "longitude" | "lon" | "longitude_text" => Column::Longitude,
            "latitude" | "lat" | "latitude_text" => Column::Latitude,
            "comments" | "free_text" => Column::FreeText,
            "reporter" | "reporter_handle" => Column::Reporter,
            _ => Column::Attribute(name.to_string()),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Reads a raw collection export.
#[derive(Debug, Clone)]
pub struct RawCollectionReader {
    delimiter: u8,
    flexible: bool,
}

impl Default for RawCollectionReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawCollectionReader {
    /// Comma-delimited, tolerant of short and long rows.
    pub fn new() -> Self {
        RawCollectionReader {
            delimiter: b',',
            flexible: true,
        }
    }

    /// Set a custom delimiter character.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter as u8;
        self
    }

    /// Set whether rows may have a different field count than the header.
    pub fn with_flexible(mut self, flexible: bool) -> Self {
        self.flexible = flexible;
        self
    }

    /// Read a file, choosing the format from its extension
    /// (`.jsonl`/`.ndjson`/`.json` for JSON Lines, anything else as CSV).
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RawRecord>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            GeoSightError::storage(format!("Cannot open raw collection {}: {e}", path.display()))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let records = match extension.as_deref() {
            Some("jsonl" | "ndjson" | "json") => self.read_jsonl(BufReader::new(file))?,
            _ => self.read_csv(file)?,
        };

        info!("Read {} raw records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Read CSV with a header row. Rows that fail to decode are skipped with
    /// a warning; a row without an id column value gets its 1-based row
    /// number as id.
    pub fn read_csv<R: Read>(&self, input: R) -> Result<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .flexible(self.flexible)
            .from_reader(input);

        let columns: Vec<Column> = reader.headers()?.iter().map(Column::from_header).collect();
        if columns.is_empty() {
            return Err(GeoSightError::invalid_query("CSV header is empty"));
        }

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping CSV row {}: {e}", index + 1);
                    continue;
                }
            };

            let mut record = RawRecord {
                id: (index + 1).to_string(),
                ..Default::default()
            };

            for (column, value) in columns.iter().zip(row.iter()) {
                match column {
                    Column::Id if !value.is_empty() => record.id = value.to_string(),
                    Column::Id => {}
                    Column::Region => record.region_code = optional(value),
                    Column::SubRegion => record.sub_region = value.to_string(),
                    Column::Country => record.country = optional(value),
                    Column::Shape => record.shape_category = optional(value),
                    Column::Longitude => record.longitude_text = value.to_string(),
                    Column::Latitude => record.latitude_text = value.to_string(),
                    Column::FreeText => record.free_text = value.to_string(),
                    Column::Reporter => record.reporter_handle = value.to_string(),
                    Column::Attribute(name) => {
                        if !value.is_empty() {
                            record.attributes.insert(name.clone(), value.to_string());
                        }
                    }
                }
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Read JSON Lines. Blank lines are ignored, undecodable lines skipped
    /// with a warning.
    pub fn read_jsonl<R: BufRead>(&self, input: R) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        for (line_num, line) in input.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RawRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping JSON line {}: {e}", line_num + 1),
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sightings_csv() {
        let csv = "\
datetime,city,state,country,shape,duration (seconds),comments,latitude ,longitude
10/10/1949 20:30,san marcos,tx,us,cylinder,2700,This event took place in early fall,29.8830556,-97.9411111
10/10/1956 21:00,edna,,,circle,20,My older brother and twin sister,,-96.6458333
";
        let records = RawCollectionReader::new().read_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.sub_region, "san marcos");
        assert_eq!(first.region_code.as_deref(), Some("tx"));
        assert_eq!(first.shape_category.as_deref(), Some("cylinder"));
        assert_eq!(first.latitude_text, "29.8830556");
        assert_eq!(first.longitude_text, "-97.9411111");
        assert_eq!(first.attributes["datetime"], "10/10/1949 20:30");
        assert_eq!(first.attributes["duration (seconds)"], "2700");

        let second = &records[1];
        assert_eq!(second.id, "2");
        assert_eq!(second.region_code, None);
        assert_eq!(second.country, None);
        assert_eq!(second.latitude_text, "");
    }

    #[test]
    fn test_csv_id_column_and_short_rows() {
        let csv = "id,state,city,comments\nabc,ny,rochester,lights\nxyz,tx\n";
        let records = RawCollectionReader::new().read_csv(csv.as_bytes()).unwrap();

        assert_eq!(records[0].id, "abc");
        assert_eq!(records[0].free_text, "lights");
        assert_eq!(records[1].id, "xyz");
        assert_eq!(records[1].sub_region, "");
    }

    #[test]
    fn test_strict_csv_skips_bad_rows() {
        let csv = "state,city\nny,rochester\ntx\nca,fresno\n";
        let records = RawCollectionReader::new()
            .with_flexible(false)
            .read_csv(csv.as_bytes())
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sub_region, "fresno");
    }

    #[test]
    fn test_read_jsonl() {
        let jsonl = r#"{"id": "1", "state": "ny", "longitude": "-77.6", "latitude": "43.15"}

not json
{"_id": "2", "shape": "disk", "comments": "hovering"}
"#;
        let records = RawCollectionReader::new()
            .read_jsonl(jsonl.as_bytes())
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].longitude_text, "-77.6");
        assert_eq!(records[1].id, "2");
        assert_eq!(records[1].free_text, "hovering");
    }

    #[test]
    fn test_read_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("sightings.csv");
        std::fs::write(&csv_path, "state,city\nny,rochester\n").unwrap();
        let jsonl_path = dir.path().join("sightings.jsonl");
        std::fs::write(&jsonl_path, "{\"id\": \"9\"}\n").unwrap();

        let reader = RawCollectionReader::new();
        assert_eq!(reader.read_path(&csv_path).unwrap()[0].sub_region, "rochester");
        assert_eq!(reader.read_path(&jsonl_path).unwrap()[0].id, "9");
        assert!(reader.read_path(dir.path().join("missing.csv")).is_err());
    }
}
