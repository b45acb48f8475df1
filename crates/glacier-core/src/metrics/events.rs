//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the ingestion
//! pipeline. Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.
//!
//! Metrics carry a `timeframe` label so multi-timeframe runs remain
//! observable per timeframe.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when rows are written to the bronze dataset.
pub struct RowsWritten {
    pub count: u64,
    /// Timeframe label for multi-timeframe runs.
    pub timeframe: String,
}

impl InternalEvent for RowsWritten {
    fn emit(self) {
        trace!(count = self.count, timeframe = %self.timeframe, "Rows written");
        counter!("glacier_rows_written_total", "timeframe" => self.timeframe).increment(self.count);
    }
}

/// Event emitted when a partition Parquet file lands in storage.
pub struct PartitionFileWritten {
    pub bytes: u64,
    /// Timeframe label for multi-timeframe runs.
    pub timeframe: String,
}

impl InternalEvent for PartitionFileWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, timeframe = %self.timeframe, "Partition file written");
        counter!("glacier_partition_files_written_total", "timeframe" => self.timeframe.clone())
            .increment(1);
        counter!("glacier_bytes_written_total", "timeframe" => self.timeframe)
            .increment(self.bytes);
    }
}

/// Event emitted when the resume resolver produces a resume point.
pub struct ResumePointResolved {
    /// Timeframe label for multi-timeframe runs.
    pub timeframe: String,
}

impl InternalEvent for ResumePointResolved {
    fn emit(self) {
        trace!(timeframe = %self.timeframe, "Resume point resolved");
        counter!("glacier_resume_points_resolved_total", "timeframe" => self.timeframe)
            .increment(1);
    }
}

/// Event emitted when the resolver falls back to ingesting from the beginning.
pub struct ResumeFallback {
    /// Timeframe label for multi-timeframe runs.
    pub timeframe: String,
}

impl InternalEvent for ResumeFallback {
    fn emit(self) {
        trace!(timeframe = %self.timeframe, "Resume fallback");
        counter!("glacier_resume_fallbacks_total", "timeframe" => self.timeframe).increment(1);
    }
}

/// Event emitted when the state record is persisted.
pub struct StateSaved {
    /// Timeframe label for multi-timeframe runs.
    pub timeframe: String,
}

impl InternalEvent for StateSaved {
    fn emit(self) {
        trace!(timeframe = %self.timeframe, "State saved");
        counter!("glacier_state_saves_total", "timeframe" => self.timeframe).increment(1);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    List,
    Rename,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::List => "list",
            StorageOperation::Rename => "rename",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "glacier_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "glacier_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
