//! Glacier: Resumable bronze-layer ingestion for time-series market data.
//!
//! This crate handles:
//! - Resolving where a prior run left off from the dataset's own metadata
//! - Writing bar batches into `timeframe/year/month` Parquet partitions
//! - Recording progress in a shared state record for cheap resume

pub mod bar;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resume;
pub mod sink;
pub mod state;

// Re-export commonly used items
pub use bar::{Bar, CLOSE_TIME_COLUMN, CLOSE_TIME_ORDINAL};
pub use config::{CliArgs, Config};
pub use error::PipelineError;
pub use pipeline::{IngestPipeline, IngestSummary};
pub use resume::ResumeResolver;
pub use sink::{PartitionWriter, WriteSummary};
pub use state::StateStore;

// Re-export from glacier-core
pub use glacier_core::{
    ParquetCompression, StorageProvider, StorageProviderRef, init_metrics, init_tracing,
};
