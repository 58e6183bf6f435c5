use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::persist::StoredValue;
use crate::settings::{KeyValueStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    committed: HashMap<String, StoredValue>,
    pending: HashMap<String, StoredValue>,
    commits: usize,
    fail_commits: bool,
    fail_reads: bool,
}

/// Volatile [`KeyValueStore`] with staged writes and failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a committed string, bypassing staging.
    pub fn insert_str(&self, key: &str, value: &str) {
        lock(&self.inner)
            .committed
            .insert(key.to_string(), StoredValue::Str(value.to_string()));
    }

    /// Write a committed integer, bypassing staging.
    pub fn insert_u32(&self, key: &str, value: u32) {
        lock(&self.inner)
            .committed
            .insert(key.to_string(), StoredValue::U32(value));
    }

    pub fn fail_commits(&self, fail: bool) {
        lock(&self.inner).fail_commits = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        lock(&self.inner).fail_reads = fail;
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        lock(&self.inner).commits
    }

    pub fn has_pending(&self) -> bool {
        !lock(&self.inner).pending.is_empty()
    }

    fn read(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let inner = lock(&self.inner);
        if inner.fail_reads {
            return Err(StoreError::Read {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(inner.committed.get(key).cloned())
    }

    fn stage(&mut self, key: &str, value: StoredValue) {
        lock(&self.inner).pending.insert(key.to_string(), value);
    }
}

impl KeyValueStore for MemoryStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.read(key)?
            .map(|v| v.as_str(key).map(str::to_string))
            .transpose()
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        self.read(key)?.map(|v| v.as_u32(key)).transpose()
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.stage(key, StoredValue::Str(value.to_string()));
        Ok(())
    }

    fn set_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.stage(key, StoredValue::U32(value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        if inner.fail_commits {
            inner.pending.clear();
            return Err(StoreError::Commit("injected commit failure".to_string()));
        }
        let pending = std::mem::take(&mut inner.pending);
        inner.committed.extend(pending);
        inner.commits += 1;
        Ok(())
    }

    fn discard(&mut self) {
        lock(&self.inner).pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_staged_writes_invisible_until_commit() {
        let mut store = MemoryStore::new();
        store.set_str("crypto", "ETH").unwrap();

        assert_eq!(store.get_str("crypto").unwrap(), None);
        assert!(store.has_pending());

        store.commit().unwrap();
        assert_eq!(store.get_str("crypto").unwrap().as_deref(), Some("ETH"));
        assert!(!store.has_pending());
    }

    #[test]
    fn test_type_mismatch_is_read_error() {
        let store = MemoryStore::new();
        store.insert_u32("interval", 60);
        assert!(matches!(
            store.get_str("interval"),
            Err(StoreError::Read { .. })
        ));
    }
}
