//! Durable ingestion state for pause/resume.
//!
//! One shared JSON record maps each timeframe to the last successfully
//! persisted close timestamp. The record is the cheap resume hint; the
//! dataset scan in `resume` remains the ground truth.
//!
//! Updates are read-modify-write over the whole record. A missing record
//! is an empty record, not an error. Updates are serialized through an
//! internal mutex so concurrent per-timeframe tasks sharing one store
//! cannot clobber each other's entries.

use object_store::path::Path;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use glacier_core::metrics::events::StateSaved;
use glacier_core::{StorageProvider, emit};

use crate::error::{CorruptSnafu, EncodeSnafu, LoadSnafu, PersistSnafu, StateError};

/// The state record: timeframe → last persisted close timestamp (ms).
pub type StateRecord = BTreeMap<String, i64>;

/// Store for the shared ingestion state record.
pub struct StateStore {
    storage: Arc<StorageProvider>,
    /// Path of the state record within the storage root.
    path: Path,
    /// Serializes read-modify-write cycles across concurrent writers.
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Create a state store over the record at `path`.
    pub fn new(storage: Arc<StorageProvider>, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: Path::from(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the last persisted close timestamp for a timeframe.
    ///
    /// Returns `Ok(None)` when the record does not exist yet or carries no
    /// entry for the timeframe.
    pub async fn read(&self, timeframe: &str) -> Result<Option<i64>, StateError> {
        let record = self.load().await?;
        Ok(record.get(timeframe).copied())
    }

    /// Record the last persisted close timestamp for a timeframe.
    ///
    /// Read-modify-write over the full record: the existing record is
    /// loaded (missing → empty), the entry is overwritten, and the whole
    /// record is persisted atomically, pretty-printed for human inspection.
    pub async fn write(&self, timeframe: &str, close_time: i64) -> Result<(), StateError> {
        let _guard = self.write_lock.lock().await;

        let mut record = match self.load().await {
            Ok(record) => record,
            Err(StateError::Corrupt { source }) => {
                // An unparseable record cannot be merged with; overwriting
                // it is the only way forward. The dataset scan still
                // recovers any entries lost here.
                warn!(error = %source, "State record is corrupt, rewriting from scratch");
                StateRecord::new()
            }
            Err(e) => return Err(e),
        };

        record.insert(timeframe.to_string(), close_time);

        let json = serde_json::to_vec_pretty(&record).context(EncodeSnafu)?;
        self.storage
            .atomic_write(&self.path, json)
            .await
            .context(PersistSnafu)?;

        emit!(StateSaved {
            timeframe: timeframe.to_string(),
        });
        debug!(timeframe, close_time, "State record updated");

        Ok(())
    }

    /// Load the full state record, treating "does not exist" as empty.
    async fn load(&self) -> Result<StateRecord, StateError> {
        match self.storage.get(self.path.clone()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).context(CorruptSnafu),
            Err(e) if e.is_not_found() => {
                debug!(path = %self.path, "No state record yet, starting empty");
                Ok(StateRecord::new())
            }
            Err(e) => Err(e).context(LoadSnafu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn store_for(temp_dir: &TempDir) -> StateStore {
        let storage = Arc::new(
            StorageProvider::for_url_with_options(
                temp_dir.path().to_str().unwrap(),
                HashMap::new(),
            )
            .await
            .unwrap(),
        );
        StateStore::new(storage, "metadata/state.json")
    }

    #[tokio::test]
    async fn test_missing_record_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        assert_eq!(store.read("1h").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        store.write("1h", 123_456).await.unwrap();
        assert_eq!(store.read("1h").await.unwrap(), Some(123_456));
    }

    #[tokio::test]
    async fn test_writes_do_not_clobber_other_timeframes() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        store.write("1h", 123_456).await.unwrap();
        store.write("1d", 999).await.unwrap();

        assert_eq!(store.read("1h").await.unwrap(), Some(123_456));
        assert_eq!(store.read("1d").await.unwrap(), Some(999));
    }

    #[tokio::test]
    async fn test_rewrite_overwrites_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        store.write("1h", 1000).await.unwrap();
        store.write("1h", 2000).await.unwrap();

        assert_eq!(store.read("1h").await.unwrap(), Some(2000));
    }

    #[tokio::test]
    async fn test_record_is_pretty_printed_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        store.write("1h", 1_700_000_000_000).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join("metadata/state.json")).unwrap();
        assert!(raw.contains('\n'), "Record should be pretty-printed");
        let parsed: StateRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.get("1h"), Some(&1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_no_temp_residue_after_write() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_for(&temp_dir).await;

        store.write("1h", 1000).await.unwrap();

        assert!(
            !temp_dir.path().join("metadata/state.json.tmp").exists(),
            "Atomic write should leave no temp file behind"
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_read_is_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("metadata")).unwrap();
        std::fs::write(temp_dir.path().join("metadata/state.json"), b"not json").unwrap();

        let store = store_for(&temp_dir).await;
        let err = store.read("1h").await.unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_rewritten_on_write() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("metadata")).unwrap();
        std::fs::write(temp_dir.path().join("metadata/state.json"), b"not json").unwrap();

        let store = store_for(&temp_dir).await;
        store.write("1h", 5000).await.unwrap();

        assert_eq!(store.read("1h").await.unwrap(), Some(5000));
    }

    #[tokio::test]
    async fn test_concurrent_writes_preserve_both_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(store_for(&temp_dir).await);

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.write("1h", 111).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.write("1d", 222).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(store.read("1h").await.unwrap(), Some(111));
        assert_eq!(store.read("1d").await.unwrap(), Some(222));
    }
}
