//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{GeoSightArgs, OutputFormat};
use crate::error::Result;

const TEXT_PREVIEW_CHARS: usize = 72;

/// Result structure for distinct value listings.
#[derive(Debug, Serialize, Deserialize)]
pub struct DistinctResult {
    pub field: String,
    pub values: Vec<String>,
}

/// Result structure for comment appends.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResult {
    pub id: String,
    pub comments: Vec<String>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &GeoSightArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &GeoSightArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    if let Some(records) = value.get("data").and_then(|d| d.as_array()) {
        output_query_response_human(records, &value);
    } else if let Some(values) = value.get("values").and_then(|v| v.as_array()) {
        for item in values {
            println!("  {}", format_value(item));
        }
        println!();
        println!("{} values", values.len());
    } else if value.get("id").is_some() && value.get("free_text").is_some() {
        output_record_human(&value);
    } else {
        output_generic_human(&value, 0);
    }

    Ok(())
}

/// Output a page of query results in human format.
fn output_query_response_human(records: &[serde_json::Value], page: &serde_json::Value) {
    for (i, record) in records.iter().enumerate() {
        println!("{:>3}. {}", i + 1, record_summary(record));
        let text = record
            .get("free_text")
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        if !text.is_empty() {
            println!("     {}", preview(text));
        }
    }

    if !records.is_empty() {
        println!();
    }
    println!(
        "Page {} ({} of {} results){}",
        format_value(&page["page"]),
        records.len(),
        format_value(&page["total"]),
        if page["has_more"].as_bool().unwrap_or(false) {
            ", more available"
        } else {
            ""
        }
    );
}

/// Output a single record in human format.
fn output_record_human(record: &serde_json::Value) {
    println!("{}", record_summary(record));
    println!();
    println!("{}", record["free_text"].as_str().unwrap_or_default());

    if let Some(attributes) = record.get("attributes").and_then(|a| a.as_object()) {
        println!();
        for (key, value) in attributes {
            println!("  {key}: {}", format_value(value));
        }
    }

    if let Some(comments) = record.get("user_comments").and_then(|c| c.as_array())
        && !comments.is_empty()
    {
        println!();
        println!("Comments:");
        for comment in comments {
            println!("  - {}", format_value(comment));
        }
    }

    for key in ["region_image", "shape_image"] {
        if let Some(image) = record.get(key).and_then(|i| i.as_str()) {
            println!("{key}: {} bytes (base64)", image.len());
        }
    }
}

fn record_summary(record: &serde_json::Value) -> String {
    let mut summary = format!(
        "[{}] {}, {}",
        format_value(&record["id"]),
        format_value(&record["sub_region"]),
        format_value(&record["region_code"]),
    );

    if let Some(shape) = record["shape_category"].as_str() {
        summary.push_str(&format!(" ({shape})"));
    }

    match (record["latitude"].as_f64(), record["longitude"].as_f64()) {
        (Some(lat), Some(lon)) => summary.push_str(&format!(" @ {lat:.4}, {lon:.4}")),
        _ => summary.push_str(" @ no location"),
    }

    if let Some(distance) = record.get("distance_m").and_then(|d| d.as_f64()) {
        summary.push_str(&format!(" [{:.2} km]", distance / 1_000.0));
    }

    summary
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

/// Generic human output for other result types.
fn output_generic_human(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                if val.is_object() {
                    println!("{pad}{key}:");
                    output_generic_human(val, indent + 1);
                } else {
                    println!("{pad}{key}: {}", format_value(val));
                }
            }
        }
        other => println!("{pad}{}", format_value(other)),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &GeoSightArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Array(arr) => arr
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Object(_) => value.to_string(),
    }
}
