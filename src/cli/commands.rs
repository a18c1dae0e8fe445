//! Command implementations for the GeoSight CLI.

use std::io::Read;
use std::sync::Arc;

use log::debug;

use crate::builder::GeoIndexBuilder;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::GeoSightConfig;
use crate::error::{GeoSightError, Result};
use crate::media::MediaResolver;
use crate::query::{Predicate, QueryEngine, QueryRequest, SortDirection, SortSpec, TextScope};
use crate::raw::RawCollectionReader;
use crate::store::SightingStore;

/// Execute a CLI command.
pub fn execute_command(args: GeoSightArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    debug!("Effective configuration: {config:?}");

    match &args.command {
        Command::Rebuild(rebuild_args) => rebuild(rebuild_args, &config, &args),
        Command::Nearby(nearby_args) => {
            let predicate = Predicate::Nearby {
                lat: nearby_args.lat,
                lon: nearby_args.lon,
                radius: nearby_args.radius,
                unit: nearby_args.unit,
            };
            run_query(paged_request(predicate, &nearby_args.paging), &config, &args)
        }
        Command::Polygon(polygon_args) => {
            let ring: Vec<[f64; 2]> = serde_json::from_str(&polygon_args.ring).map_err(|e| {
                GeoSightError::invalid_query(format!("Ring must be a JSON array of pairs: {e}"))
            })?;
            let predicate = Predicate::Polygon { ring };
            run_query(paged_request(predicate, &polygon_args.paging), &config, &args)
        }
        Command::Equals(equals_args) => {
            let predicate = Predicate::Equals {
                field: equals_args.field,
                value: equals_args.value.clone(),
            };
            run_query(paged_request(predicate, &equals_args.paging), &config, &args)
        }
        Command::Text(text_args) => {
            let predicate = Predicate::Text {
                q: text_args.token.clone(),
                scope: if text_args.all {
                    TextScope::All
                } else {
                    TextScope::FreeText
                },
            };
            run_query(paged_request(predicate, &text_args.paging), &config, &args)
        }
        Command::Query(query_args) => {
            let json = match &query_args.request {
                Some(json) => json.clone(),
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            run_query(QueryRequest::from_json(&json)?, &config, &args)
        }
        Command::Distinct(distinct_args) => {
            let engine = open_engine(&config)?;
            output_result(
                &format!("Distinct values of {}", distinct_args.field),
                &DistinctResult {
                    field: distinct_args.field.to_string(),
                    values: engine.distinct(distinct_args.field),
                },
                &args,
            )
        }
        Command::Comment(comment_args) => {
            let engine = open_engine(&config)?;
            engine.append_comment(&comment_args.id, &comment_args.text)?;
            let record = engine.record(&comment_args.id, false)?;
            output_result(
                "Comment added",
                &CommentResult {
                    id: record.id,
                    comments: record.user_comments,
                },
                &args,
            )
        }
        Command::Show(show_args) => {
            let engine = open_engine(&config)?;
            let record = engine.record(&show_args.id, !show_args.no_media)?;
            output_result("Record", &record, &args)
        }
        Command::Stats => {
            let store = config.open_store()?;
            output_result("Collection statistics", &store.stats(), &args)
        }
    }
}

/// Load the config file (if any) and apply command line overrides.
pub fn resolve_config(args: &GeoSightArgs) -> Result<GeoSightConfig> {
    let mut config = match &args.config {
        Some(path) => GeoSightConfig::from_file(path)?,
        None => GeoSightConfig::default(),
    };

    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(media_dir) = &args.media_dir {
        config.media_dir = media_dir.clone();
    }
    if let Some(backend) = args.backend {
        config.spatial_backend = backend;
    }
    if let Command::Rebuild(rebuild_args) = &args.command {
        if let Some(policy) = rebuild_args.coordinate_policy {
            config.coordinate_policy = policy;
        }
        if rebuild_args.threads.is_some() {
            config.thread_pool_size = rebuild_args.threads;
        }
    }

    config.validate()?;
    Ok(config)
}

fn paged_request(predicate: Predicate, paging: &PageArgs) -> QueryRequest {
    let mut request = QueryRequest::new(predicate)
        .with_page(paging.page)
        .with_media(!paging.no_media);

    if let Some(column) = paging.sort {
        request = request.with_sort(SortSpec {
            column,
            direction: if paging.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        });
    }

    request
}

fn open_engine(config: &GeoSightConfig) -> Result<QueryEngine> {
    let store = Arc::new(config.open_store()?);
    let catalog = Arc::new(config.media_catalog()?);
    Ok(QueryEngine::new(store, catalog).with_page_size(config.page_size))
}

fn run_query(request: QueryRequest, config: &GeoSightConfig, args: &GeoSightArgs) -> Result<()> {
    let engine = open_engine(config)?;
    let response = engine.execute(&request)?;
    output_result(
        &format!("{} query results", request.predicate.name()),
        &response,
        args,
    )
}

/// Rebuild the collection from a raw export.
fn rebuild(rebuild_args: &RebuildArgs, config: &GeoSightConfig, args: &GeoSightArgs) -> Result<()> {
    if args.verbosity() > 1 {
        println!("Reading raw collection from: {}", rebuild_args.input.display());
    }

    let raw = RawCollectionReader::new()
        .with_delimiter(rebuild_args.delimiter)
        .read_path(&rebuild_args.input)?;

    let categories = Arc::new(config.categories()?);
    let catalog = Arc::new(config.media_catalog()?);
    let resolver = MediaResolver::new(categories, catalog);

    let store = Arc::new(SightingStore::create(
        config.data_storage()?,
        config.spatial_backend,
    ));
    let builder = GeoIndexBuilder::new(
        store,
        resolver,
        config.coordinate_policy,
        config.thread_pool_size,
    )?;

    let report = builder.rebuild(&raw)?;
    output_result("Rebuild complete", &report, args)
}
