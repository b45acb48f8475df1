//! The OHLC bar record and its canonical Arrow schema.
//!
//! Column order follows the legacy kline layout so that datasets written
//! without field names remain readable by position: `close_time` sits at
//! ordinal 6.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use serde::{Deserialize, Serialize};

/// Canonical name of the event-close timestamp column.
pub const CLOSE_TIME_COLUMN: &str = "close_time";

/// Ordinal of the close-time column in the canonical layout.
pub const CLOSE_TIME_ORDINAL: usize = 6;

/// One OHLC time bar.
///
/// Timestamps are milliseconds since epoch. `close_time` is the event
/// timestamp that drives partitioning and resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: i64,
}

/// The canonical Arrow schema for bar records.
pub fn bar_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("open_time", DataType::Int64, false),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("volume", DataType::Float64, false),
        Field::new(CLOSE_TIME_COLUMN, DataType::Int64, false),
        Field::new("quote_volume", DataType::Float64, false),
        Field::new("trade_count", DataType::Int64, false),
    ]))
}

/// Build a record batch from a group of bars.
pub fn bars_to_batch(bars: &[&Bar]) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(
            bars.iter().map(|b| b.open_time),
        )),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.open))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.high))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.low))),
        Arc::new(Float64Array::from_iter_values(bars.iter().map(|b| b.close))),
        Arc::new(Float64Array::from_iter_values(
            bars.iter().map(|b| b.volume),
        )),
        Arc::new(Int64Array::from_iter_values(
            bars.iter().map(|b| b.close_time),
        )),
        Arc::new(Float64Array::from_iter_values(
            bars.iter().map(|b| b.quote_volume),
        )),
        Arc::new(Int64Array::from_iter_values(
            bars.iter().map(|b| b.trade_count),
        )),
    ];

    RecordBatch::try_new(bar_schema(), columns)
}
