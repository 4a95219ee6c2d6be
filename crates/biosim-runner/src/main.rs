//! Headless runner for island jobs.
//!
//! Usage: `biosim-runner <job.json> [result.json]`. Without a result path the
//! result is written to stdout.

mod telemetry;

use anyhow::{bail, Context, Result};
use biosim_world::{IslandJob, IslandResult};
use std::fs;
use tracing::{info, warn};

fn main() -> Result<()> {
    let json_logs = std::env::var("BIOSIM_LOG_FORMAT").is_ok_and(|format| format == "json");
    telemetry::init_telemetry(json_logs)?;

    let mut args = std::env::args().skip(1);
    let Some(job_path) = args.next() else {
        bail!("usage: biosim-runner <job.json> [result.json]");
    };
    let result_path = args.next();

    let text = fs::read_to_string(&job_path)
        .with_context(|| format!("failed to read job file {job_path}"))?;
    let job = IslandJob::from_json(&text).with_context(|| format!("invalid job file {job_path}"))?;

    info!(
        job = %job_path,
        seed = job.config.seed,
        num_years = job.config.num_years,
        "Starting BioSim island job"
    );

    let result = job.execute().context("island job failed")?;
    report(&result);

    let output = serde_json::to_string_pretty(&result)?;
    match result_path {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("failed to write {path}"))?;
            info!(path = %path, "Result written");
        }
        None => println!("{output}"),
    }

    Ok(())
}

fn report(result: &IslandResult) {
    for warning in &result.warnings {
        warn!("{}", warning);
    }

    for census in &result.result.history {
        info!(
            year = census.year,
            herbivores = census.counts.herbivores,
            carnivores = census.counts.carnivores,
            "Year census"
        );
    }
}
