//! Settings storage in NVS flash.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use ticker_core::persist::{commit_write_through, StoredValue, WriteThrough};
use ticker_core::settings::{KeyValueStore, StoreError};

/// Namespace holding the ticker settings.
pub const NVS_NAMESPACE: &str = "storage";

/// Longest string value read back, NUL terminator included.
const MAX_STR_LEN: usize = 65;

/// [`KeyValueStore`] over one NVS namespace.
///
/// `EspNvs` persists every set on its own, so writes are held in memory
/// until [`commit`](KeyValueStore::commit). A commit that fails part way
/// restores the keys it already overwrote; only a power loss (or a failed
/// restore, which is logged) mid-commit can leave a mix of old and new
/// values.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
    pending: Vec<(String, StoredValue)>,
}

impl NvsStore {
    pub fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self {
            nvs,
            pending: Vec::new(),
        })
    }

    fn stage(&mut self, key: &str, value: StoredValue) {
        self.pending.retain(|(k, _)| k != key);
        self.pending.push((key.to_string(), value));
    }
}

fn read_error(key: &str, reason: impl core::fmt::Debug) -> StoreError {
    StoreError::Read {
        key: key.to_string(),
        reason: format!("{:?}", reason),
    }
}

fn write_error(key: &str, reason: impl core::fmt::Debug) -> StoreError {
    StoreError::Write {
        key: key.to_string(),
        reason: format!("{:?}", reason),
    }
}

impl WriteThrough for NvsStore {
    fn read_like(&self, key: &str, like: &StoredValue) -> Result<Option<StoredValue>, StoreError> {
        Ok(match like {
            StoredValue::Str(_) => self.get_str(key)?.map(StoredValue::Str),
            StoredValue::U32(_) => self.get_u32(key)?.map(StoredValue::U32),
        })
    }

    fn write(&mut self, key: &str, value: &StoredValue) -> Result<(), StoreError> {
        let written = match value {
            StoredValue::Str(s) => self.nvs.set_str(key, s),
            StoredValue::U32(v) => self.nvs.set_u32(key, *v),
        };
        written.map_err(|e| write_error(key, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.nvs
            .remove(key)
            .map(|_| ())
            .map_err(|e| write_error(key, e))
    }
}

impl KeyValueStore for NvsStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut buf = [0u8; MAX_STR_LEN];
        match self.nvs.get_str(key, &mut buf) {
            Ok(value) => Ok(value.map(str::to_string)),
            Err(e) => Err(read_error(key, e)),
        }
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        self.nvs.get_u32(key).map_err(|e| read_error(key, e))
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() >= MAX_STR_LEN {
            return Err(StoreError::TooLong {
                key: key.to_string(),
                capacity: MAX_STR_LEN - 1,
            });
        }
        self.stage(key, StoredValue::Str(value.to_string()));
        Ok(())
    }

    fn set_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.stage(key, StoredValue::U32(value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut self.pending);
        commit_write_through(self, &pending)
    }

    fn discard(&mut self) {
        self.pending.clear();
    }
}
