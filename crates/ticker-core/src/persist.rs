//! Staged commits on storage that persists every write on its own.
//!
//! NVS applies each `set` immediately, so a batch of staged settings is
//! written key by key. [`commit_write_through`] snapshots the keys it is
//! about to overwrite and puts them back if any write fails, which keeps
//! the [`KeyValueStore`](crate::settings::KeyValueStore) commit contract
//! on such storage. It does not survive power loss mid-commit.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::settings::StoreError;

/// A typed value in a key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Str(String),
    U32(u32),
}

impl StoredValue {
    /// Typed read, mismatches reported the way NVS reports them.
    pub fn as_str(&self, key: &str) -> Result<&str, StoreError> {
        match self {
            StoredValue::Str(s) => Ok(s),
            StoredValue::U32(_) => Err(type_mismatch(key, "string")),
        }
    }

    pub fn as_u32(&self, key: &str) -> Result<u32, StoreError> {
        match self {
            StoredValue::U32(v) => Ok(*v),
            StoredValue::Str(_) => Err(type_mismatch(key, "u32")),
        }
    }
}

fn type_mismatch(key: &str, expected: &str) -> StoreError {
    StoreError::Read {
        key: key.to_string(),
        reason: format!("stored value is not a {}", expected),
    }
}

/// Storage where every write is durable as soon as it returns.
pub trait WriteThrough {
    /// Current value of `key`, read with the type of `like`.
    fn read_like(&self, key: &str, like: &StoredValue) -> Result<Option<StoredValue>, StoreError>;

    fn write(&mut self, key: &str, value: &StoredValue) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Write `staged` in order, restoring the previous contents on failure.
///
/// Prior values are read before anything is written; a failed read aborts
/// the commit untouched. A failed write rolls back every key touched so far
/// (including the one that failed), in reverse order.
pub fn commit_write_through<W: WriteThrough + ?Sized>(
    store: &mut W,
    staged: &[(String, StoredValue)],
) -> Result<(), StoreError> {
    let mut prior = Vec::with_capacity(staged.len());
    for (key, value) in staged {
        let previous = store
            .read_like(key, value)
            .map_err(|e| StoreError::Commit(format!("snapshot of `{}` failed: {}", key, e)))?;
        prior.push(previous);
    }

    for (written, (key, value)) in staged.iter().enumerate() {
        if let Err(e) = store.write(key, value) {
            warn!("Write of `{}` failed, rolling back {} key(s)", key, written);
            rollback(store, &staged[..=written], &prior[..=written]);
            return Err(StoreError::Commit(e.to_string()));
        }
    }
    debug!("Committed {} key(s)", staged.len());
    Ok(())
}

fn rollback<W: WriteThrough + ?Sized>(
    store: &mut W,
    staged: &[(String, StoredValue)],
    prior: &[Option<StoredValue>],
) {
    for ((key, _), previous) in staged.iter().zip(prior).rev() {
        let restored = match previous {
            Some(value) => store.write(key, value),
            None => store.remove(key),
        };
        if let Err(e) = restored {
            error!("Could not restore `{}`: {}", key, e);
        }
    }
}
