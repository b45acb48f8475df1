//! glacier-core: Shared components for the glacier ingestion pipeline.
//!
//! This crate contains the infrastructure the ingestion app is built on:
//!
//! - `storage/` - Storage abstraction over S3-compatible object stores and
//!   the local filesystem
//! - `metrics/` - Prometheus metrics infrastructure
//! - `config` - Common configuration types
//! - `partition` - Partition key derivation from event time
//! - `tracing` - Tracing initialization
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{MetricsConfig, ParquetCompression};
pub use error::{ConfigError, MetricsError, StorageError};
pub use metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use partition::{PartitionKey, timeframe_prefix};
pub use storage::{
    BackendConfig, LocalConfig, S3Config, StorageProvider, StorageProviderRef, list_parquet_files,
};
pub use tracing::init_tracing;
