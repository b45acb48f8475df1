//! Partition key derivation from event time.
//!
//! Maps a close-time millisecond timestamp onto the Hive-style
//! `timeframe=<tf>/year=<Y>/month=<M>` layout used by the bronze dataset.

use chrono::{DateTime, Datelike, Utc};

/// Partition key for one bronze dataset partition.
///
/// The key is a pure function of a record's close timestamp and the
/// timeframe it belongs to: two records with the same timeframe and
/// close timestamps in the same UTC calendar month always share a
/// partition.
///
/// # Examples
///
/// ```
/// use glacier_core::PartitionKey;
///
/// // 2023-11-14T22:13:20Z
/// let key = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
/// assert_eq!(key.relative_path(), "timeframe=1h/year=2023/month=11");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    /// Timeframe identifier (e.g. "1h", "1d").
    pub timeframe: String,
    /// UTC calendar year of the close timestamp.
    pub year: i32,
    /// UTC calendar month of the close timestamp (1-12).
    pub month: u32,
}

impl PartitionKey {
    /// Derive the partition key for a close timestamp in milliseconds.
    ///
    /// Returns `None` when the timestamp falls outside the representable
    /// datetime range.
    pub fn from_close_time(timeframe: &str, close_time_ms: i64) -> Option<Self> {
        let dt: DateTime<Utc> = DateTime::from_timestamp_millis(close_time_ms)?;
        Some(Self {
            timeframe: timeframe.to_string(),
            year: dt.year(),
            month: dt.month(),
        })
    }

    /// Render the partition directory path relative to the dataset prefix.
    ///
    /// Months are zero-padded so lexicographic listing order matches
    /// chronological order within a year.
    pub fn relative_path(&self) -> String {
        format!(
            "timeframe={}/year={}/month={:02}",
            self.timeframe, self.year, self.month
        )
    }
}

/// Render the listing prefix spanning every partition of one timeframe.
pub fn timeframe_prefix(timeframe: &str) -> String {
    format!("timeframe={timeframe}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_from_close_time() {
        // 2026-01-15T00:00:00Z
        let key = PartitionKey::from_close_time("1h", 1_768_435_200_000).unwrap();
        assert_eq!(key.timeframe, "1h");
        assert_eq!(key.year, 2026);
        assert_eq!(key.month, 1);
    }

    #[test]
    fn test_partition_key_is_pure_function_of_inputs() {
        let a = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
        let b = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_month_same_partition() {
        // Two timestamps one hour apart in the same month.
        let a = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
        let b = PartitionKey::from_close_time("1h", 1_700_003_600_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_month_different_partition() {
        // 2023-11-14 vs 2023-12-14
        let nov = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
        let dec = PartitionKey::from_close_time("1h", 1_702_592_000_000).unwrap();
        assert_ne!(nov, dec);
        assert_eq!(nov.month, 11);
        assert_eq!(dec.month, 12);
    }

    #[test]
    fn test_timeframe_distinguishes_partitions() {
        let hourly = PartitionKey::from_close_time("1h", 1_700_000_000_000).unwrap();
        let daily = PartitionKey::from_close_time("1d", 1_700_000_000_000).unwrap();
        assert_ne!(hourly, daily);
    }

    #[test]
    fn test_relative_path_zero_pads_month() {
        let key = PartitionKey {
            timeframe: "1d".to_string(),
            year: 2026,
            month: 3,
        };
        assert_eq!(key.relative_path(), "timeframe=1d/year=2026/month=03");
    }

    #[test]
    fn test_out_of_range_timestamp() {
        assert!(PartitionKey::from_close_time("1h", i64::MAX).is_none());
    }

    #[test]
    fn test_timeframe_prefix() {
        assert_eq!(timeframe_prefix("1h"), "timeframe=1h");
    }
}
