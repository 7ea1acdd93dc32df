//! Batch training entrypoint
//!
//! Usage: `energy-forecast-train [--dry-run] [CSV_PATH]`
//!
//! `--dry-run` logs the run record instead of appending it to the runs file.

use anyhow::Result;
use energy_forecast::{
    config::Config,
    ml::{
        pipeline::run_training,
        tracking::{JsonLinesSink, TracingSink, TrackingSink},
    },
    telemetry,
};
use std::path::PathBuf;
use tracing::{error, info};

fn run() -> Result<()> {
    let mut cfg = Config::load()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    if let Some(path) = args.iter().find(|a| !a.starts_with("--")) {
        cfg.data.csv_path = PathBuf::from(path);
    }

    let sink: Box<dyn TrackingSink> = if dry_run {
        Box::new(TracingSink)
    } else {
        Box::new(JsonLinesSink::new(&cfg.tracking.runs_path))
    };
    let summary = run_training(&cfg, sink.as_ref())?;

    info!(
        run_id = %summary.run_id,
        rows = summary.rows,
        seasonal = %summary.seasonal,
        gbm = %summary.gbm,
        artifacts = summary.artifacts.len(),
        "training run finished"
    );
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    if let Err(e) = run() {
        error!(error = %format!("{e:#}"), "training failed");
        std::process::exit(1);
    }
}
