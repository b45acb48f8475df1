//! Glacier CLI: reports the resume point for each configured timeframe.
//!
//! The upstream producer invokes the library's `IngestPipeline` directly;
//! the standalone binary answers "where would ingestion continue from?"
//! against the configured bucket.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use glacier::{CliArgs, Config, IngestPipeline, StorageProvider, init_metrics, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(metrics) = &config.metrics {
        let addr = match metrics.address.parse() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Invalid metrics address '{}': {e}", metrics.address);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = init_metrics(addr) {
            eprintln!("Failed to initialize metrics: {e}");
            return ExitCode::FAILURE;
        }
    }

    let storage = match StorageProvider::for_backend(
        config.storage.backend(),
        config.storage.storage_options.clone(),
    )
    .await
    {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to open storage: {e}");
            return ExitCode::FAILURE;
        }
    };

    let timeframes = if args.timeframes.is_empty() {
        config.timeframes.clone()
    } else {
        args.timeframes.clone()
    };

    info!(
        bucket = %config.storage.bucket,
        timeframes = ?timeframes,
        "Resolving resume points"
    );

    let pipeline = IngestPipeline::from_config(storage, &config);

    // resume_point never fails: read problems demote to "from the beginning"
    for timeframe in &timeframes {
        match pipeline.resume_point(timeframe).await {
            Some(close_time) => {
                info!(
                    timeframe,
                    close_time,
                    "Ingestion would continue above this close timestamp"
                );
            }
            None => {
                info!(timeframe, "Ingestion would start from the beginning");
            }
        }
    }

    ExitCode::SUCCESS
}
