//! Configuration for the glacier ingestion pipeline.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigError;
use glacier_core::error::{
    EmptyBucketSnafu, EmptyDatasetPrefixSnafu, EmptyStatePathSnafu, NoTimeframesSnafu,
};
use glacier_core::{BackendConfig, LocalConfig, MetricsConfig, ParquetCompression, S3Config};
use snafu::ensure;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "glacier",
    about = "Resumable bronze-layer ingestion for time-series market data"
)]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "GLACIER_CONFIG")]
    pub config: String,

    /// Restrict the run to specific timeframes (defaults to all configured).
    #[arg(long = "timeframe")]
    pub timeframes: Vec<String>,
}

/// Object storage configuration.
///
/// Credentials are never configured here: the S3 client picks them up from
/// the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket name, or an absolute filesystem path for local runs.
    pub bucket: String,
    /// AWS region.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom S3-compatible endpoint (e.g. MinIO).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Extra options passed through to the object store client.
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl StorageConfig {
    /// Resolve the backend this configuration points at.
    ///
    /// An absolute path selects the local filesystem backend, anything else
    /// is treated as an S3 bucket name.
    pub fn backend(&self) -> BackendConfig {
        if self.bucket.starts_with('/') {
            BackendConfig::Local(LocalConfig {
                path: self.bucket.clone(),
                key: None,
            })
        } else {
            BackendConfig::S3(S3Config {
                endpoint: self.endpoint.clone(),
                region: self.region.clone(),
                bucket: self.bucket.clone(),
                key: None,
            })
        }
    }
}

/// Bronze dataset layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Prefix of the bronze dataset within the bucket.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Path of the shared state record within the bucket.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_prefix() -> String {
    "bronze".to_string()
}

fn default_state_path() -> String {
    "metadata/state.json".to_string()
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            state_path: default_state_path(),
        }
    }
}

/// Partition writer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Parquet compression codec for partition files.
    #[serde(default)]
    pub compression: ParquetCompression,
}

/// Main configuration for glacier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Bronze dataset layout.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Partition writer configuration.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Optional Prometheus metrics endpoint.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    /// Timeframes to process, in order.
    pub timeframes: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)
            .map_err(|source| ConfigError::YamlParse { source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.storage.bucket.is_empty(), EmptyBucketSnafu);
        ensure!(!self.timeframes.is_empty(), NoTimeframesSnafu);
        ensure!(!self.dataset.prefix.is_empty(), EmptyDatasetPrefixSnafu);
        ensure!(!self.dataset.state_path.is_empty(), EmptyStatePathSnafu);
        Ok(())
    }
}
