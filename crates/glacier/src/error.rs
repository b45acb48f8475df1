//! Error types for the glacier ingestion pipeline.

use snafu::prelude::*;

// Re-export common errors
pub use glacier_core::error::{ConfigError, StorageError};

/// Errors that can occur while resolving the close-time column in a
/// dataset schema.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum SchemaResolutionError {
    /// No close-time column could be resolved by name or ordinal.
    #[snafu(display(
        "No close-time column found by name or at the legacy ordinal (schema has {columns} columns)"
    ))]
    NoCloseTimeColumn { columns: usize },

    /// The resolved column does not hold millisecond timestamps.
    #[snafu(display("Close-time column '{column}' has unsupported physical type {physical}"))]
    UnsupportedColumnType { column: String, physical: String },
}

/// Errors that can occur while scanning a dataset for its resume point.
///
/// These never escape the resume resolver's public contract: the resolver
/// demotes every variant to "no prior data" and logs it, so a transient
/// read error causes conservative re-processing rather than a failed run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResumeError {
    /// Listing or reading dataset objects failed.
    #[snafu(display("Dataset read failed: {source}"))]
    DatasetRead { source: StorageError },

    /// A Parquet footer or column could not be decoded.
    #[snafu(display("Parquet decode failed for {path}: {source}"))]
    ParquetDecode {
        path: String,
        source: parquet::errors::ParquetError,
    },

    /// Arrow-level column decode failed during the stats fallback scan.
    #[snafu(display("Column scan failed for {path}: {source}"))]
    ColumnScan {
        path: String,
        source: arrow::error::ArrowError,
    },

    /// The dataset schema has no usable close-time column.
    #[snafu(display("Schema resolution failed for {path}: {source}"))]
    Schema {
        path: String,
        source: SchemaResolutionError,
    },
}

/// Errors that can occur while writing a batch to the bronze dataset.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Building the Arrow record batch failed.
    #[snafu(display("Failed to build record batch: {source}"))]
    BatchBuild { source: arrow::error::ArrowError },

    /// Serializing the batch to Parquet failed.
    #[snafu(display("Failed to serialize Parquet: {source}"))]
    Serialize {
        source: parquet::errors::ParquetError,
    },

    /// A record's close timestamp cannot be mapped to a partition.
    #[snafu(display("Close timestamp {close_time} is outside the partitionable range"))]
    TimestampOutOfRange { close_time: i64 },

    /// The object store rejected the partition file write.
    #[snafu(display("Partition write failed: {source}"))]
    Write { source: StorageError },
}

/// Errors that can occur while reading or persisting the state record.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StateError {
    /// Reading the state record failed (other than "does not exist").
    #[snafu(display("Failed to load state record: {source}"))]
    Load { source: StorageError },

    /// The state record exists but is not valid JSON.
    #[snafu(display("State record is corrupt: {source}"))]
    Corrupt { source: serde_json::Error },

    /// Encoding the state record failed.
    // Name avoids a snafu selector conflict with SinkError::Serialize
    #[snafu(display("Failed to encode state record: {source}"))]
    Encode { source: serde_json::Error },

    /// Persisting the state record failed.
    #[snafu(display("Failed to persist state record: {source}"))]
    Persist { source: StorageError },
}

/// Top-level pipeline errors.
///
/// The two variants are deliberately distinct: a `Sink` failure means the
/// batch is not durable and state was not advanced; a `StateUpdate`
/// failure means the data IS durable but the recorded resume point is
/// stale, which the resume resolver's dataset scan heals on the next run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error outside the sink path.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Writing the batch to the bronze dataset failed.
    #[snafu(display("Sink error: {source}"))]
    Sink { source: SinkError },

    /// The data write succeeded but recording progress did not.
    #[snafu(display("State update failed after durable write: {source}"))]
    StateUpdate { source: StateError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::Storage { source }
    }
}

impl From<SinkError> for PipelineError {
    fn from(source: SinkError) -> Self {
        PipelineError::Sink { source }
    }
}
