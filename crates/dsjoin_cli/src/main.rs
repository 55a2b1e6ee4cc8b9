//! Command-line front end for the datasource joiner.
//!
//! # Responsibility
//! - Wire configuration, cache store and joiner the way an embedding
//!   application would.
//! - Print the local override storage and optional search hits.
//!
//! Usage: `dsjoin_cli <config.json> <cache.sqlite3> [column pattern]`
//!
//! Set `DSJOIN_LOG_DIR` to an absolute path to enable file logging.

use dsjoin_core::{
    core_version, default_log_level, init_logging, Dataset, DatasourceJoiner, DjDataset,
    JoinerConfig, SqliteCacheStore,
};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, cache_path, search) = match args.as_slice() {
        [config, cache] => (config, cache, None),
        [config, cache, column, pattern] => (config, cache, Some((column, pattern))),
        _ => {
            eprintln!("usage: dsjoin_cli <config.json> <cache.sqlite3> [column pattern]");
            return ExitCode::from(2);
        }
    };

    if let Ok(log_dir) = std::env::var("DSJOIN_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(config_path, cache_path, search) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    config_path: &str,
    cache_path: &str,
    search: Option<(&String, &String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("dsjoin_core version={}", core_version());

    let config = JoinerConfig::from_path(config_path)?;
    let mut cache = SqliteCacheStore::open(cache_path)?;
    let joiner = DatasourceJoiner::from_config(&config, &cache)?;

    println!(
        "main={} degraded={} datasources={}",
        joiner.main_datasource_name(),
        joiner.is_degraded(),
        joiner.datasource_names().join(",")
    );
    if let Some(report) = joiner.last_reconcile() {
        println!(
            "reconciled refreshed={} stale={} local_only={}",
            report.refreshed.len(),
            report.stale.len(),
            report.local_only
        );
    }

    let columns = joiner.los().columns();
    println!("-- local override storage ({} records)", joiner.los().len());
    for record in joiner.get_los() {
        let marker = if joiner.is_selected(&record) { "*" } else { " " };
        println!("{marker} {}", render(&record, columns));
    }

    if let Some((column, pattern)) = search {
        let hits = joiner.find(column, pattern)?;
        println!("-- find {column}={pattern} ({} hits)", hits.len());
        for hit in hits.iter() {
            println!("  {}", render(hit, columns));
        }
    }

    joiner.save_cache(&mut cache)?;
    info!(
        "event=cli_run module=cli status=ok records={}",
        joiner.los().len()
    );
    Ok(())
}

fn render(record: &DjDataset, columns: &[String]) -> String {
    let fields: Vec<String> = columns
        .iter()
        .map(|column| {
            let value = record.get(column).ok().flatten().unwrap_or("");
            let marker = if record.has_local_override(column) { "!" } else { "" };
            format!("{column}{marker}={value}")
        })
        .collect();
    format!("[{}] {}", record.key(), fields.join(" "))
}
