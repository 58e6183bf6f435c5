//! Settings persisted to a JSON file, standing in for NVS flash.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use ticker_core::settings::{KeyValueStore, StoreError};
use ticker_core::persist::StoredValue;
use tracing::debug;

/// File-backed [`KeyValueStore`].
///
/// Commits write the whole map to a sibling temp file and rename it over
/// the original, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    committed: BTreeMap<String, StoredValue>,
    pending: BTreeMap<String, StoredValue>,
}

impl FileStore {
    /// Open `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let committed = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                StoreError::Unavailable(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        debug!("Opened {} ({} keys)", path.display(), committed.len());
        Ok(Self {
            path,
            committed,
            pending: BTreeMap::new(),
        })
    }

    fn write(&self, contents: &BTreeMap<String, StoredValue>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(contents)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

impl KeyValueStore for FileStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.committed
            .get(key)
            .map(|v| v.as_str(key).map(str::to_string))
            .transpose()
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        self.committed.get(key).map(|v| v.as_u32(key)).transpose()
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.pending
            .insert(key.to_string(), StoredValue::Str(value.to_string()));
        Ok(())
    }

    fn set_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.pending.insert(key.to_string(), StoredValue::U32(value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut self.pending);
        let mut next = self.committed.clone();
        next.extend(pending);

        self.write(&next)
            .map_err(|e| StoreError::Commit(format!("{}: {}", self.path.display(), e)))?;
        self.committed = next;
        Ok(())
    }

    fn discard(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ticker_core::settings::{Settings, SettingsStore, KEY_ASSET, KEY_INTERVAL};

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get_str(KEY_ASSET).unwrap(), None);
    }

    #[test]
    fn test_committed_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_str(KEY_ASSET, "ETH").unwrap();
        store.set_u32(KEY_INTERVAL, 30).unwrap();
        store.commit().unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get_str(KEY_ASSET).unwrap().as_deref(), Some("ETH"));
        assert_eq!(store.get_u32(KEY_INTERVAL).unwrap(), Some(30));
    }

    #[test]
    fn test_uncommitted_writes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_str(KEY_ASSET, "ETH").unwrap();
        assert_eq!(store.get_str(KEY_ASSET).unwrap(), None);
        store.discard();
        store.commit().unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get_str(KEY_ASSET).unwrap(), None);
    }

    #[test]
    fn test_failed_commit_keeps_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_str(KEY_ASSET, "ETH").unwrap();

        assert!(matches!(store.commit(), Err(StoreError::Commit(_))));
        assert_eq!(store.get_str(KEY_ASSET).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_settings_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = SettingsStore::new(FileStore::open(&path).unwrap());
        settings.ensure_defaults().unwrap();

        let reopened = SettingsStore::new(FileStore::open(&path).unwrap());
        assert_eq!(reopened.load(), Settings::default());
    }
}
