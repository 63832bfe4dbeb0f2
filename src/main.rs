//! path-embed - Binary Entry Point
//!
//! Runs allocation, training and evaluation over the directory named by
//! `KGE_DATA_DIR`. When `KGE_RAW_TRIPLES` names a raw triple file, the
//! dataset is prepared from it first.

use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use path_embed::graph::TsvSource;
use path_embed::{Pipeline, PipelineConfig, Result};

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = PipelineConfig::from_env()?;
    info!(
        version = path_embed::VERSION,
        data_dir = %config.data_dir.display(),
        "Starting"
    );
    let pipeline = Pipeline::new(config)?;

    if let Ok(raw) = env::var("KGE_RAW_TRIPLES") {
        pipeline.prepare(&TsvSource::new(raw))?;
    }

    let summary = pipeline.run()?;
    info!(
        epochs = summary.training.epochs,
        final_error = ?summary.training.final_error(),
        "Done"
    );
    Ok(())
}
