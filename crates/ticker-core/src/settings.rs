//! Persisted user settings.
//!
//! The device keeps five keys in a durable key-value store (NVS on ESP32, a
//! JSON file in the simulator). [`KeyValueStore`] is the platform seam and
//! [`SettingsStore`] is the typed layer the rest of the firmware uses.
//!
//! Values are always read fresh from the backing store. Nothing here caches
//! a value, so a save followed by a restart is what makes changes visible.

use std::time::Duration;
use tracing::{debug, info, warn};

pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASS: &str = "wifi_pass";
pub const KEY_ASSET: &str = "crypto";
pub const KEY_CURRENCY: &str = "currency";
pub const KEY_INTERVAL: &str = "interval";

pub const SSID_CAPACITY: usize = 32;
pub const PASSPHRASE_CAPACITY: usize = 64;
pub const ASSET_CAPACITY: usize = 10;
pub const CURRENCY_CAPACITY: usize = 4;

pub const DEFAULT_ASSET: &str = "BTC";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_INTERVAL_SECS: u32 = 60;

/// Assets offered by the configuration form.
pub const SUPPORTED_ASSETS: [&str; 9] = [
    "BTC", "ETH", "SOL", "ADA", "XRP", "LTC", "ETC", "DOGE", "HNT",
];

/// Quote currencies offered by the configuration form.
pub const SUPPORTED_CURRENCIES: [&str; 2] = ["USD", "EUR"];

pub type Ssid = heapless::String<SSID_CAPACITY>;
pub type Passphrase = heapless::String<PASSPHRASE_CAPACITY>;
pub type AssetSymbol = heapless::String<ASSET_CAPACITY>;
pub type CurrencyCode = heapless::String<CURRENCY_CAPACITY>;

/// Errors reported by a [`KeyValueStore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read `{key}`: {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write `{key}`: {reason}")]
    Write { key: String, reason: String },

    #[error("Failed to commit settings: {0}")]
    Commit(String),

    #[error("Stored value for `{key}` does not fit in {capacity} bytes")]
    TooLong { key: String, capacity: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string did not fit its bounded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("value of {len} bytes exceeds capacity of {capacity} bytes")]
pub struct CapacityError {
    pub len: usize,
    pub capacity: usize,
}

/// Copy `value` into a bounded string.
///
/// Fails instead of truncating.
pub fn bounded<const N: usize>(value: &str) -> Result<heapless::String<N>, CapacityError> {
    heapless::String::try_from(value).map_err(|_| CapacityError {
        len: value.len(),
        capacity: N,
    })
}

/// Durable key-value storage.
///
/// `set_*` calls are staged and only become visible to `get_*` after a
/// successful [`commit`](KeyValueStore::commit). A failed commit discards
/// the staged writes, leaving the previously committed values in place.
/// Atomicity is per key; there are no multi-key transactions.
pub trait KeyValueStore: Send {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError>;

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn set_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError>;

    /// Persist all staged writes.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Drop all staged writes without persisting them.
    fn discard(&mut self);
}

/// Network credentials for station mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: Ssid,
    /// Empty for networks without authentication.
    pub passphrase: Passphrase,
}

impl Credentials {
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            ssid: bounded(ssid)?,
            passphrase: bounded(passphrase)?,
        })
    }

    /// True when no passphrase is configured.
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }
}

/// The full set of persisted settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub credentials: Option<Credentials>,
    pub asset_symbol: AssetSymbol,
    pub currency_code: CurrencyCode,
    pub refresh_interval_secs: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: None,
            asset_symbol: AssetSymbol::try_from(DEFAULT_ASSET).unwrap_or_default(),
            currency_code: CurrencyCode::try_from(DEFAULT_CURRENCY).unwrap_or_default(),
            refresh_interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Typed settings access over a [`KeyValueStore`].
///
/// Read failures are absorbed: they are logged and the caller gets the
/// default (or no credentials). Only writes report errors.
#[derive(Debug)]
pub struct SettingsStore<K> {
    kv: K,
}

impl<K: KeyValueStore> SettingsStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Write the default asset, currency and interval if they are absent.
    ///
    /// Returns `true` when defaults were written (first boot).
    pub fn ensure_defaults(&mut self) -> Result<bool, StoreError> {
        let staged = match self.stage_defaults() {
            Ok(staged) => staged,
            Err(e) => {
                self.kv.discard();
                return Err(e);
            }
        };

        if staged {
            if let Err(e) = self.kv.commit() {
                self.kv.discard();
                return Err(e);
            }
            info!(
                "Initialised settings with defaults ({}/{} every {}s)",
                DEFAULT_ASSET, DEFAULT_CURRENCY, DEFAULT_INTERVAL_SECS
            );
        }
        Ok(staged)
    }

    /// Stored station credentials, if an SSID is configured.
    ///
    /// A missing passphrase is treated as an open network.
    pub fn credentials(&self) -> Option<Credentials> {
        let ssid = self.read_str(KEY_WIFI_SSID).filter(|s| !s.is_empty())?;
        let passphrase = self.read_str(KEY_WIFI_PASS).unwrap_or_default();

        match Credentials::new(&ssid, &passphrase) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Ignoring stored credentials: {}", e);
                None
            }
        }
    }

    pub fn asset_symbol(&self) -> AssetSymbol {
        self.read_bounded(KEY_ASSET)
            .unwrap_or_else(|| Settings::default().asset_symbol)
    }

    pub fn currency_code(&self) -> CurrencyCode {
        self.read_bounded(KEY_CURRENCY)
            .unwrap_or_else(|| Settings::default().currency_code)
    }

    /// Stored refresh interval in seconds, never zero.
    pub fn refresh_interval_secs(&self) -> u32 {
        match self.kv.get_u32(KEY_INTERVAL) {
            Ok(Some(0)) => {
                warn!(
                    "Stored interval is 0, using {}s instead",
                    DEFAULT_INTERVAL_SECS
                );
                DEFAULT_INTERVAL_SECS
            }
            Ok(Some(secs)) => secs,
            Ok(None) => DEFAULT_INTERVAL_SECS,
            Err(e) => {
                warn!("{}", e);
                DEFAULT_INTERVAL_SECS
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval_secs()))
    }

    /// Snapshot of every setting.
    pub fn load(&self) -> Settings {
        Settings {
            credentials: self.credentials(),
            asset_symbol: self.asset_symbol(),
            currency_code: self.currency_code(),
            refresh_interval_secs: self.refresh_interval_secs(),
        }
    }

    /// Write all five keys and commit them together.
    ///
    /// On failure nothing is persisted and the previous values remain.
    pub fn save(&mut self, settings: &Settings) -> Result<(), StoreError> {
        let result = self.stage(settings).and_then(|_| self.kv.commit());
        if result.is_err() {
            self.kv.discard();
        }
        result
    }

    fn stage_defaults(&mut self) -> Result<bool, StoreError> {
        let mut staged = false;

        if self.kv.get_str(KEY_ASSET)?.is_none() {
            self.kv.set_str(KEY_ASSET, DEFAULT_ASSET)?;
            staged = true;
        }
        if self.kv.get_str(KEY_CURRENCY)?.is_none() {
            self.kv.set_str(KEY_CURRENCY, DEFAULT_CURRENCY)?;
            staged = true;
        }
        if self.kv.get_u32(KEY_INTERVAL)?.is_none() {
            self.kv.set_u32(KEY_INTERVAL, DEFAULT_INTERVAL_SECS)?;
            staged = true;
        }
        Ok(staged)
    }

    fn stage(&mut self, settings: &Settings) -> Result<(), StoreError> {
        let (ssid, passphrase) = match &settings.credentials {
            Some(c) => (c.ssid.as_str(), c.passphrase.as_str()),
            None => ("", ""),
        };
        self.kv.set_str(KEY_WIFI_SSID, ssid)?;
        self.kv.set_str(KEY_WIFI_PASS, passphrase)?;
        self.kv.set_str(KEY_ASSET, &settings.asset_symbol)?;
        self.kv.set_str(KEY_CURRENCY, &settings.currency_code)?;
        self.kv.set_u32(KEY_INTERVAL, settings.refresh_interval_secs)?;
        debug!("Staged settings for `{}`", ssid);
        Ok(())
    }

    fn read_str(&self, key: &str) -> Option<String> {
        match self.kv.get_str(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn read_bounded<const N: usize>(&self, key: &str) -> Option<heapless::String<N>> {
        let value = self.read_str(key)?;
        match bounded(&value) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(
                    "{}",
                    StoreError::TooLong {
                        key: key.to_string(),
                        capacity: N,
                    }
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryStore;
    use pretty_assertions::assert_eq;

    fn settings(asset: &str, currency: &str, interval: u32) -> Settings {
        Settings {
            credentials: Some(Credentials::new("HomeNet", "hunter22").unwrap()),
            asset_symbol: bounded(asset).unwrap(),
            currency_code: bounded(currency).unwrap(),
            refresh_interval_secs: interval,
        }
    }

    #[test]
    fn test_first_boot_writes_defaults() {
        let kv = MemoryStore::new();
        let mut store = SettingsStore::new(kv.clone());

        assert!(store.ensure_defaults().unwrap());
        assert_eq!(kv.get_str(KEY_ASSET).unwrap().as_deref(), Some("BTC"));
        assert_eq!(kv.get_str(KEY_CURRENCY).unwrap().as_deref(), Some("USD"));
        assert_eq!(kv.get_u32(KEY_INTERVAL).unwrap(), Some(60));
        assert_eq!(store.load(), Settings::default());

        // Second boot leaves existing values alone.
        assert!(!store.ensure_defaults().unwrap());
    }

    #[test]
    fn test_defaults_do_not_overwrite_existing_values() {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_ASSET, "ETH");
        let mut store = SettingsStore::new(kv);

        store.ensure_defaults().unwrap();
        assert_eq!(store.asset_symbol().as_str(), "ETH");
        assert_eq!(store.currency_code().as_str(), "USD");
    }

    #[test]
    fn test_credentials_absent_without_ssid() {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_WIFI_PASS, "secret");
        let store = SettingsStore::new(kv.clone());
        assert_eq!(store.credentials(), None);

        kv.insert_str(KEY_WIFI_SSID, "");
        assert_eq!(store.credentials(), None);
    }

    #[test]
    fn test_credentials_without_passphrase_are_open() {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_WIFI_SSID, "Cafe");
        let store = SettingsStore::new(kv);

        let credentials = store.credentials().unwrap();
        assert_eq!(credentials.ssid.as_str(), "Cafe");
        assert!(credentials.is_open());
    }

    #[test]
    fn test_oversized_stored_ssid_ignored() {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_WIFI_SSID, &"x".repeat(SSID_CAPACITY + 1));
        let store = SettingsStore::new(kv);
        assert_eq!(store.credentials(), None);
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let kv = MemoryStore::new();
        kv.insert_u32(KEY_INTERVAL, 0);
        let store = SettingsStore::new(kv);
        assert_eq!(store.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_save_commits_all_keys() {
        let kv = MemoryStore::new();
        let mut store = SettingsStore::new(kv.clone());

        store.save(&settings("ETH", "EUR", 30)).unwrap();

        assert_eq!(kv.get_str(KEY_WIFI_SSID).unwrap().as_deref(), Some("HomeNet"));
        assert_eq!(kv.get_str(KEY_WIFI_PASS).unwrap().as_deref(), Some("hunter22"));
        assert_eq!(kv.get_str(KEY_ASSET).unwrap().as_deref(), Some("ETH"));
        assert_eq!(kv.get_str(KEY_CURRENCY).unwrap().as_deref(), Some("EUR"));
        assert_eq!(kv.get_u32(KEY_INTERVAL).unwrap(), Some(30));
        assert_eq!(kv.commit_count(), 1);
    }

    #[test]
    fn test_failed_commit_keeps_previous_values() {
        let kv = MemoryStore::new();
        let mut store = SettingsStore::new(kv.clone());
        store.save(&settings("ETH", "EUR", 30)).unwrap();

        kv.fail_commits(true);
        let result = store.save(&settings("SOL", "USD", 120));
        assert!(matches!(result, Err(StoreError::Commit(_))));

        kv.fail_commits(false);
        assert_eq!(store.load(), settings("ETH", "EUR", 30));
        assert!(!kv.has_pending());
    }

    #[test]
    fn test_unreadable_store_falls_back_to_defaults() {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_ASSET, "ETH");
        kv.fail_reads(true);
        let store = SettingsStore::new(kv);

        assert_eq!(store.asset_symbol().as_str(), DEFAULT_ASSET);
        assert_eq!(store.refresh_interval_secs(), DEFAULT_INTERVAL_SECS);
        assert_eq!(store.credentials(), None);
    }

    #[test]
    fn test_bounded_rejects_overflow() {
        let ok: Result<CurrencyCode, _> = bounded("EUR");
        assert_eq!(ok.unwrap().as_str(), "EUR");

        let err: Result<CurrencyCode, _> = bounded("EURO5");
        assert_eq!(err, Err(CapacityError { len: 5, capacity: 4 }));
    }
}
