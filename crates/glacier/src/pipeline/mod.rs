//! Per-timeframe ingestion pass.
//!
//! Composes the resume resolver, partition writer, and state store into
//! the pipeline invoked once per timeframe:
//!
//! 1. `resume_point` reports where the previous run left off.
//! 2. The caller fetches bars above that point (the producer is an
//!    external collaborator).
//! 3. `ingest` persists the batch and records progress.

use std::sync::Arc;
use tracing::{info, warn};

use glacier_core::{ParquetCompression, StorageProvider};

use crate::bar::Bar;
use crate::config::Config;
use crate::error::{PipelineError, StateError};
use crate::resume::ResumeResolver;
use crate::sink::PartitionWriter;
use crate::state::StateStore;

/// Summary of one ingestion pass for a timeframe.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Rows persisted to the bronze dataset.
    pub rows: usize,
    /// Partition files written.
    pub files: Vec<String>,
    /// The close timestamp recorded as the new resume point, if any.
    pub last_close_time: Option<i64>,
}

/// The resumable ingestion pipeline for one dataset root.
pub struct IngestPipeline {
    resolver: ResumeResolver,
    writer: PartitionWriter,
    state: StateStore,
}

impl IngestPipeline {
    /// Build a pipeline over the given storage root.
    pub fn new(
        storage: Arc<StorageProvider>,
        prefix: impl Into<String>,
        state_path: impl Into<String>,
        compression: ParquetCompression,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            resolver: ResumeResolver::new(storage.clone(), prefix.clone()),
            writer: PartitionWriter::new(storage.clone(), prefix, compression),
            state: StateStore::new(storage, state_path),
        }
    }

    /// Build a pipeline from the application config.
    pub fn from_config(storage: Arc<StorageProvider>, config: &Config) -> Self {
        Self::new(
            storage,
            config.dataset.prefix.clone(),
            config.dataset.state_path.clone(),
            config.sink.compression,
        )
    }

    /// Determine the resume point for a timeframe.
    ///
    /// The state record is consulted first as a cheap hint, but the
    /// dataset-derived maximum is authoritative whenever both exist;
    /// divergence is logged and the dataset value wins. Returns `None`
    /// for "ingest from the beginning".
    pub async fn resume_point(&self, timeframe: &str) -> Option<i64> {
        let hint = match self.state.read(timeframe).await {
            Ok(hint) => hint,
            Err(StateError::Corrupt { source }) => {
                warn!(timeframe, error = %source, "State record unreadable, ignoring hint");
                None
            }
            Err(e) => {
                warn!(timeframe, error = %e, "State record unavailable, ignoring hint");
                None
            }
        };

        let observed = self.resolver.resolve(timeframe).await;

        match (hint, observed) {
            (Some(hint), Some(observed)) if hint != observed => {
                warn!(
                    timeframe,
                    hint,
                    observed,
                    "State record diverges from dataset maximum, trusting the dataset"
                );
            }
            (Some(hint), None) => {
                warn!(
                    timeframe,
                    hint,
                    "State record has an entry but the dataset scan found nothing, re-ingesting"
                );
            }
            _ => {}
        }

        observed
    }

    /// Persist a batch of bars and record progress.
    ///
    /// The state record is only advanced after the data write succeeds. A
    /// state failure after a durable write surfaces as `StateUpdate`: the
    /// data stands, the recorded resume point is stale, and the next run's
    /// dataset scan heals the difference.
    pub async fn ingest(
        &self,
        timeframe: &str,
        bars: &[Bar],
    ) -> Result<IngestSummary, PipelineError> {
        let summary = self
            .writer
            .write_batch(timeframe, bars)
            .await
            .map_err(|source| PipelineError::Sink { source })?;

        if let Some(max_close_time) = summary.max_close_time {
            self.state
                .write(timeframe, max_close_time)
                .await
                .map_err(|source| PipelineError::StateUpdate { source })?;
        }

        info!(
            timeframe,
            rows = summary.rows,
            files = summary.files.len(),
            "Ingestion pass complete"
        );

        Ok(IngestSummary {
            rows: summary.rows,
            files: summary.files,
            last_close_time: summary.max_close_time,
        })
    }
}
