//! fidstats runner
//!
//! `fidstats <job.toml>` computes the activation statistics of one dataset and
//! saves them as `.npz`. The job file may also be given through
//! `FIDSTATS_CONFIG`.

mod config;
mod run;

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::JobConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FIDSTATS_CONFIG").ok())
        .ok_or("usage: fidstats <job.toml> (or set FIDSTATS_CONFIG)")?;

    let config = JobConfig::load(Path::new(&path))?;
    info!(config = %path, extractor = ?config.extractor, "Loaded job");

    let saved = run::run(&config)?;
    info!(path = %saved.display(), "Done");
    Ok(())
}
