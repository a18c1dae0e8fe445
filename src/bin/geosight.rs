//! GeoSight CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use geosight::cli::args::*;
use geosight::cli::commands::*;

fn main() {
    let args = GeoSightArgs::parse();

    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    Builder::new()
        .filter_level(log_level)
        .parse_env("GEOSIGHT_LOG")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = execute_command(args) {
        let kind = if e.is_client_error() { "Invalid request" } else { "Error" };
        eprintln!("{kind}: {e}");
        process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}
