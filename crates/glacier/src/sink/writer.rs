//! Parquet serialization for partition files.

use parquet::arrow::ArrowWriter;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use snafu::prelude::*;

use glacier_core::ParquetCompression;

use crate::bar::{Bar, bars_to_batch};
use crate::error::{BatchBuildSnafu, SerializeSnafu, SinkError};

/// Serialize a group of bars into a single Parquet file.
///
/// Row-group statistics stay enabled regardless of codec: the resume
/// resolver depends on them for its metadata-only maximum.
pub(crate) fn encode_partition(
    bars: &[&Bar],
    compression: ParquetCompression,
) -> Result<Vec<u8>, SinkError> {
    let batch = bars_to_batch(bars).context(BatchBuildSnafu)?;

    let props = WriterProperties::builder()
        .set_compression(compression.to_compression())
        .set_statistics_enabled(EnabledStatistics::Chunk)
        .build();

    let mut buffer = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).context(SerializeSnafu)?;
    writer.write(&batch).context(SerializeSnafu)?;
    writer.close().context(SerializeSnafu)?;

    Ok(buffer)
}
