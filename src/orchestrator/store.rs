//! Durable, boot-surviving run state.
//!
//! The state record is the minimal projection needed to re-attach to a run
//! after the machine comes back up: identity, phase cursor, reboot counter.
//! `save` follows a write-fsync-rename sequence so either the complete
//! record exists on disk or the previous one does. A reader never observes
//! a partial record, and the write is committed to storage before control
//! returns to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::StoreError;

/// The durable projection of a run, written before any reboot and read once
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateRecord {
    /// Opaque run identity
    pub run_id: Uuid,
    /// Index of the next phase to execute
    pub cursor: usize,
    /// Reboots accepted so far within this run
    pub reboot_count: u32,
    /// SHA-256 of the plan file this record belongs to
    pub plan_hash: String,
    /// When this record was persisted
    pub saved_at: DateTime<Utc>,
}

/// Contract for the boot-surviving state store.
pub trait StateStore: Send + Sync {
    /// Persist the record. Must be durable before returning: the caller
    /// proceeds straight to the reboot trigger.
    fn save(&self, record: &StateRecord) -> Result<(), StoreError>;

    /// Load the last saved record, or `None` when no run is persisted.
    fn load(&self) -> Result<Option<StateRecord>, StoreError>;

    /// Remove any persisted record. Idempotent.
    fn clear(&self) -> Result<(), StoreError>;
}

/// File-backed state store holding a single pretty-printed JSON record.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        name.push_str(".tmp");
        self.path.with_file_name(format!(".{name}"))
    }
}

impl StateStore for FileStateStore {
    fn save(&self, record: &StateRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;
        let tmp = self.tmp_path();

        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        // Write-fsync-rename: the record becomes visible all at once, and
        // only after it is committed to storage.
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(write_err)?;

        if let Some(parent) = self.path.parent() {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(write_err)?;
        }

        Ok(())
    }

    fn load(&self) -> Result<Option<StateRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        let record = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(record))
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| StoreError::Remove {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store() -> (FileStateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        (FileStateStore::new(path), dir)
    }

    fn sample_record(cursor: usize, reboot_count: u32) -> StateRecord {
        StateRecord {
            run_id: Uuid::new_v4(),
            cursor,
            reboot_count,
            plan_hash: "abc123".to_string(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_empty_returns_none() {
        let (store, _dir) = make_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _dir) = make_store();
        let record = sample_record(1, 2);
        store.save(&record).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let (store, _dir) = make_store();
        let first = sample_record(0, 0);
        store.save(&first).unwrap();

        let mut second = first.clone();
        second.cursor = 3;
        second.reboot_count = 1;
        store.save(&second).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.cursor, 3);
        assert_eq!(loaded.reboot_count, 1);
    }

    #[test]
    fn test_save_leaves_no_temp_file_behind() {
        let (store, dir) = make_store();
        store.save(&sample_record(0, 0)).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[test]
    fn test_clear_then_load_returns_none() {
        let (store, _dir) = make_store();
        store.save(&sample_record(2, 1)).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, _dir) = make_store();
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn test_recovery_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let record = sample_record(1, 1);

        {
            let store = FileStateStore::new(path.clone());
            store.save(&record).unwrap();
        }

        {
            let store = FileStateStore::new(path);
            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded.run_id, record.run_id);
            assert_eq!(loaded.cursor, 1);
            assert_eq!(loaded.reboot_count, 1);
        }
    }

    #[test]
    fn test_save_into_missing_directory_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("state.json");
        let store = FileStateStore::new(path);
        let err = store.save(&sample_record(0, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn test_corrupt_record_is_an_error_not_none() {
        let (store, _dir) = make_store();
        std::fs::write(store.path(), "{ half a rec").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
