//! Resume point resolution from the bronze dataset.
//!
//! Determines the maximum close timestamp already durably present for a
//! timeframe by inspecting the partitioned dataset itself. Only Parquet
//! footer metadata and row-group statistics are consulted; when a file
//! lacks statistics, just the close-time column is decoded. Full tables
//! are never materialized.
//!
//! The resolver's public contract never fails: any error while listing,
//! decoding, or resolving the schema is demoted to "no prior data" and
//! logged, so the caller re-ingests from the beginning. Writes are
//! idempotent partition-merges, which makes re-processing safe while
//! silently skipping data would not be.

pub mod schema;

pub use schema::{ResolvedColumn, resolve_close_time};

use arrow::array::Int64Array;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use parquet::arrow::ProjectionMask;
use parquet::file::metadata::ParquetMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use snafu::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use glacier_core::metrics::events::{ResumeFallback, ResumePointResolved};
use glacier_core::{StorageProvider, emit, list_parquet_files, timeframe_prefix};

use crate::error::{
    ColumnScanSnafu, DatasetReadSnafu, ParquetDecodeSnafu, ResumeError, SchemaResolutionError,
    SchemaSnafu,
};

/// Resolves the resume point for a timeframe from the dataset itself.
pub struct ResumeResolver {
    storage: Arc<StorageProvider>,
    /// Dataset prefix within the storage root (e.g. "bronze").
    prefix: String,
}

impl ResumeResolver {
    /// Create a resolver for a dataset rooted at `prefix`.
    pub fn new(storage: Arc<StorageProvider>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Resolve the maximum close timestamp durably present for a timeframe.
    ///
    /// Returns `None` for "no prior data — ingest from the beginning".
    /// This call never fails: errors are demoted to `None` and logged.
    pub async fn resolve(&self, timeframe: &str) -> Option<i64> {
        match self.dataset_max(timeframe).await {
            Ok(Some(max)) => {
                let rendered = DateTime::from_timestamp_millis(max)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "<out of range>".to_string());
                info!(
                    timeframe,
                    close_time = max,
                    at = %rendered,
                    "Resume point found"
                );
                emit!(ResumePointResolved {
                    timeframe: timeframe.to_string(),
                });
                Some(max)
            }
            Ok(None) => {
                info!(timeframe, "No prior data, ingesting from the beginning");
                None
            }
            Err(e) => {
                warn!(
                    timeframe,
                    error = %e,
                    "Dataset scan failed, falling back to ingesting from the beginning"
                );
                emit!(ResumeFallback {
                    timeframe: timeframe.to_string(),
                });
                None
            }
        }
    }

    /// Compute the dataset-wide maximum close timestamp for a timeframe.
    ///
    /// Lists every Parquet object under the timeframe prefix (spanning all
    /// year/month partitions) and folds the per-file maxima.
    async fn dataset_max(&self, timeframe: &str) -> Result<Option<i64>, ResumeError> {
        let prefix = format!("{}/{}", self.prefix, timeframe_prefix(timeframe));
        let files = list_parquet_files(&self.storage, &prefix)
            .await
            .context(DatasetReadSnafu)?;

        let mut dataset_max: Option<i64> = None;
        for file in &files {
            let data = self
                .storage
                .get(file.as_str())
                .await
                .context(DatasetReadSnafu)?;
            if let Some(file_max) = max_close_time(file, data)? {
                dataset_max = Some(dataset_max.map_or(file_max, |m| m.max(file_max)));
            }
        }

        Ok(dataset_max)
    }
}

/// Compute the maximum close timestamp of a single Parquet object.
///
/// Row-group statistics are the fast path; when any populated row group
/// lacks them, only the resolved column is decoded and folded.
fn max_close_time(path: &str, data: Bytes) -> Result<Option<i64>, ResumeError> {
    let reader = SerializedFileReader::new(data.clone()).context(ParquetDecodeSnafu { path })?;
    let meta = reader.metadata();

    if meta.file_metadata().num_rows() == 0 {
        return Ok(None);
    }

    let column =
        resolve_close_time(meta.file_metadata().schema_descr()).context(SchemaSnafu { path })?;

    if let Some(max) = max_from_stats(meta, column.index) {
        return Ok(Some(max));
    }

    debug!(
        path,
        column = %column.name,
        "Row-group statistics unavailable, scanning close-time column"
    );
    max_from_column_scan(path, data, &column)
}

/// Try to compute the maximum from row-group statistics alone.
///
/// Returns `None` when any populated row group lacks INT64 statistics,
/// in which case the caller falls back to a column scan.
fn max_from_stats(meta: &ParquetMetaData, column_index: usize) -> Option<i64> {
    let mut max: Option<i64> = None;

    for rg in meta.row_groups() {
        if rg.num_rows() == 0 {
            continue;
        }
        let stats = rg.column(column_index).statistics()?;
        let Statistics::Int64(s) = stats else {
            return None;
        };
        let rg_max = *s.max_opt()?;
        max = Some(max.map_or(rg_max, |m| m.max(rg_max)));
    }

    max
}

/// Decode only the close-time column and fold its maximum.
fn max_from_column_scan(
    path: &str,
    data: Bytes,
    column: &ResolvedColumn,
) -> Result<Option<i64>, ResumeError> {
    let metadata = ArrowReaderMetadata::load(&data, ArrowReaderOptions::default())
        .context(ParquetDecodeSnafu { path })?;
    let mask = ProjectionMask::leaves(metadata.parquet_schema(), [column.index]);

    let reader = ParquetRecordBatchReaderBuilder::new_with_metadata(data, metadata)
        .with_projection(mask)
        .build()
        .context(ParquetDecodeSnafu { path })?;

    let mut max: Option<i64> = None;
    for batch in reader {
        let batch = batch.context(ColumnScanSnafu { path })?;
        let values = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| ResumeError::Schema {
                path: path.to_string(),
                source: SchemaResolutionError::UnsupportedColumnType {
                    column: column.name.clone(),
                    physical: batch.column(0).data_type().to_string(),
                },
            })?;

        for value in values.iter().flatten() {
            max = Some(max.map_or(value, |m| m.max(value)));
        }
    }

    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, RecordBatch};
    use arrow::datatypes::{DataType, Field, Schema};
    use object_store::path::Path;
    use object_store::PutPayload;
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::{EnabledStatistics, WriterProperties};
    use std::collections::HashMap;
    use tempfile::TempDir;

    use crate::bar::bar_schema;

    async fn provider_for(temp_dir: &TempDir) -> Arc<StorageProvider> {
        Arc::new(
            StorageProvider::for_url_with_options(
                temp_dir.path().to_str().unwrap(),
                HashMap::new(),
            )
            .await
            .unwrap(),
        )
    }

    fn encode_parquet(batch: &RecordBatch, stats_enabled: bool) -> Vec<u8> {
        let props = if stats_enabled {
            WriterProperties::builder().build()
        } else {
            WriterProperties::builder()
                .set_statistics_enabled(EnabledStatistics::None)
                .build()
        };

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
        buffer
    }

    /// A canonical 9-column batch with the given close_time values.
    fn kline_batch(close_times: &[i64]) -> RecordBatch {
        let n = close_times.len();
        let f64s = |v: f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(std::iter::repeat(v).take(n)))
        };
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(
                close_times.iter().map(|t| t - 3_600_000),
            )),
            f64s(100.0),
            f64s(110.0),
            f64s(95.0),
            f64s(105.0),
            f64s(12.5),
            Arc::new(Int64Array::from_iter_values(close_times.iter().copied())),
            f64s(1312.5),
            Arc::new(Int64Array::from_iter_values(std::iter::repeat(42).take(n))),
        ];
        RecordBatch::try_new(bar_schema(), columns).unwrap()
    }

    /// Like `kline_batch` but with legacy positional field names.
    fn legacy_batch(close_times: &[i64]) -> RecordBatch {
        let canonical = kline_batch(close_times);
        let fields: Vec<Field> = canonical
            .schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| Field::new(format!("f{i}"), f.data_type().clone(), f.is_nullable()))
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), canonical.columns().to_vec()).unwrap()
    }

    async fn put_object(storage: &StorageProvider, path: &str, bytes: Vec<u8>) {
        storage
            .put_parquet(&Path::from(path), PutPayload::from(bytes))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_dataset_resolves_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, None);
    }

    #[tokio::test]
    async fn test_known_maximum_is_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        let bytes = encode_parquet(&kline_batch(&[1000, 5000, 3000]), true);
        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            bytes,
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, Some(5000));
    }

    #[tokio::test]
    async fn test_maximum_spans_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        // 2023-11 and 2023-12 partitions
        put_object(
            &storage,
            "bronze/timeframe=1h/year=2023/month=11/part-a.parquet",
            encode_parquet(&kline_batch(&[1_700_000_000_000]), true),
        )
        .await;
        put_object(
            &storage,
            "bronze/timeframe=1h/year=2023/month=12/part-b.parquet",
            encode_parquet(&kline_batch(&[1_702_592_000_000]), true),
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, Some(1_702_592_000_000));
    }

    #[tokio::test]
    async fn test_timeframes_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            encode_parquet(&kline_batch(&[5000]), true),
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, Some(5000));
        assert_eq!(resolver.resolve("1d").await, None);
    }

    #[tokio::test]
    async fn test_legacy_dataset_resolves_by_ordinal() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        let bytes = encode_parquet(&legacy_batch(&[7000, 9000]), true);
        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            bytes,
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, Some(9000));
    }

    #[tokio::test]
    async fn test_unresolvable_schema_falls_back_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        // Three columns, none of them named close_time.
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Float64, false),
            Field::new("c", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values([1, 2])) as ArrayRef,
                Arc::new(Float64Array::from_iter_values([1.0, 2.0])),
                Arc::new(Float64Array::from_iter_values([3.0, 4.0])),
            ],
        )
        .unwrap();

        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            encode_parquet(&batch, true),
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_object_falls_back_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            b"PAR1garbage".to_vec(),
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, None);
    }

    #[tokio::test]
    async fn test_stats_disabled_falls_back_to_column_scan() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        let bytes = encode_parquet(&kline_batch(&[1000, 5000, 3000]), false);
        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            bytes,
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, Some(5000));
    }

    #[tokio::test]
    async fn test_zero_row_object_is_no_prior_data() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider_for(&temp_dir).await;

        let bytes = encode_parquet(&kline_batch(&[]), true);
        put_object(
            &storage,
            "bronze/timeframe=1h/year=1970/month=01/part-a.parquet",
            bytes,
        )
        .await;

        let resolver = ResumeResolver::new(storage, "bronze");
        assert_eq!(resolver.resolve("1h").await, None);
    }

    #[test]
    fn test_max_close_time_rejects_garbage() {
        let result = max_close_time("part-a.parquet", Bytes::from_static(b"PAR1garbage"));
        assert!(matches!(result, Err(ResumeError::ParquetDecode { .. })));
    }
}
