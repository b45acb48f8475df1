//! Partition writer for the bronze dataset.
//!
//! Writes batches of bars into the object store, one Parquet file per
//! touched `timeframe/year/month` partition. Writes are additive: shard
//! filenames are unique, so existing files in the same or sibling
//! partitions are never deleted or overwritten, and retrying a batch can
//! at worst duplicate rows (deduplication belongs to the upstream
//! producer).

mod writer;

use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use glacier_core::metrics::events::{PartitionFileWritten, RowsWritten};
use glacier_core::{ParquetCompression, PartitionKey, StorageProvider, emit};

use crate::bar::Bar;
use crate::error::{SinkError, TimestampOutOfRangeSnafu, WriteSnafu};

/// Summary of one batch write.
#[derive(Debug, Default)]
pub struct WriteSummary {
    /// Total rows written.
    pub rows: usize,
    /// Relative paths of the partition files written.
    pub files: Vec<String>,
    /// Maximum close timestamp in the batch, if any rows were written.
    pub max_close_time: Option<i64>,
}

/// Writer for persisting bar batches into the partitioned dataset.
pub struct PartitionWriter {
    storage: Arc<StorageProvider>,
    /// Dataset prefix within the storage root (e.g. "bronze").
    prefix: String,
    compression: ParquetCompression,
}

impl PartitionWriter {
    /// Create a writer for a dataset rooted at `prefix`.
    pub fn new(
        storage: Arc<StorageProvider>,
        prefix: impl Into<String>,
        compression: ParquetCompression,
    ) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            compression,
        }
    }

    /// Write a batch of bars for one timeframe.
    ///
    /// Each row lands in the partition derived from its close timestamp.
    /// The state record must only be advanced after this returns `Ok`:
    /// a failed write means nothing here is known to be durable.
    pub async fn write_batch(
        &self,
        timeframe: &str,
        bars: &[Bar],
    ) -> Result<WriteSummary, SinkError> {
        if bars.is_empty() {
            return Ok(WriteSummary::default());
        }

        // Group rows by partition; BTreeMap keeps write order deterministic.
        let mut groups: BTreeMap<PartitionKey, Vec<&Bar>> = BTreeMap::new();
        for bar in bars {
            let key = PartitionKey::from_close_time(timeframe, bar.close_time).context(
                TimestampOutOfRangeSnafu {
                    close_time: bar.close_time,
                },
            )?;
            groups.entry(key).or_default().push(bar);
        }

        let mut summary = WriteSummary::default();
        for (key, group) in &groups {
            let bytes = writer::encode_partition(group, self.compression)?;
            let size = bytes.len();
            let path = format!(
                "{}/{}/part-{}.parquet",
                self.prefix,
                key.relative_path(),
                Uuid::new_v4()
            );

            self.storage
                .put_parquet(&Path::from(path.as_str()), PutPayload::from(bytes))
                .await
                .context(WriteSnafu)?;

            emit!(PartitionFileWritten {
                bytes: size as u64,
                timeframe: timeframe.to_string(),
            });
            info!(
                timeframe,
                path = %path,
                rows = group.len(),
                size,
                "Wrote partition file"
            );

            summary.rows += group.len();
            summary.files.push(path);
            let group_max = group.iter().map(|b| b.close_time).max();
            summary.max_close_time = summary.max_close_time.max(group_max);
        }

        emit!(RowsWritten {
            count: summary.rows as u64,
            timeframe: timeframe.to_string(),
        });

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn test_bar(close_time: i64) -> Bar {
        Bar {
            open_time: close_time - 3_600_000,
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 12.5,
            close_time,
            quote_volume: 1312.5,
            trade_count: 42,
        }
    }

    async fn writer_for(temp_dir: &TempDir) -> PartitionWriter {
        let storage = Arc::new(
            StorageProvider::for_url_with_options(
                temp_dir.path().to_str().unwrap(),
                HashMap::new(),
            )
            .await
            .unwrap(),
        );
        PartitionWriter::new(storage, "bronze", ParquetCompression::Zstd)
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer_for(&temp_dir).await;

        let summary = writer.write_batch("1h", &[]).await.unwrap();
        assert_eq!(summary.rows, 0);
        assert!(summary.files.is_empty());
        assert_eq!(summary.max_close_time, None);
    }

    #[tokio::test]
    async fn test_batch_spanning_months_creates_two_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer_for(&temp_dir).await;

        // 2023-11-14 and 2023-12-14
        let bars = vec![test_bar(1_700_000_000_000), test_bar(1_702_592_000_000)];
        let summary = writer.write_batch("1h", &bars).await.unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.max_close_time, Some(1_702_592_000_000));

        assert!(
            temp_dir
                .path()
                .join("bronze/timeframe=1h/year=2023/month=11")
                .is_dir()
        );
        assert!(
            temp_dir
                .path()
                .join("bronze/timeframe=1h/year=2023/month=12")
                .is_dir()
        );
    }

    #[tokio::test]
    async fn test_writes_are_additive_across_batches() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer_for(&temp_dir).await;

        let bars = vec![test_bar(1_700_000_000_000)];
        writer.write_batch("1h", &bars).await.unwrap();
        writer.write_batch("1h", &bars).await.unwrap();

        let partition = temp_dir.path().join("bronze/timeframe=1h/year=2023/month=11");
        let shards: Vec<_> = std::fs::read_dir(&partition)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(shards.len(), 2, "Each batch should land in its own shard");
    }

    #[tokio::test]
    async fn test_sibling_partitions_are_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer_for(&temp_dir).await;

        let november = vec![test_bar(1_700_000_000_000)];
        let summary = writer.write_batch("1h", &november).await.unwrap();
        let existing = temp_dir.path().join(&summary.files[0]);

        let december = vec![test_bar(1_702_592_000_000)];
        writer.write_batch("1h", &december).await.unwrap();

        assert!(
            existing.exists(),
            "Writing a new partition must not remove existing ones"
        );
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer_for(&temp_dir).await;

        let bars = vec![test_bar(i64::MAX)];
        let err = writer.write_batch("1h", &bars).await.unwrap_err();
        assert!(matches!(err, SinkError::TimestampOutOfRange { .. }));
    }
}
