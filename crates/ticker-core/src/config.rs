//! Firmware tuning parameters.
//!
//! Everything that is fixed on the device but worth adjusting in the
//! simulator lives here: access point identity, connection wait policies,
//! the price endpoint and the restart grace period. All fields have
//! defaults matching the shipped firmware, so a partial JSON document is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the lower-cased asset symbol.
pub const ASSET_PLACEHOLDER: &str = "{asset}";

/// Placeholder substituted with the lower-cased currency code.
pub const CURRENCY_PLACEHOLDER: &str = "{currency}";

/// Default price endpoint.
pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price?symbols={asset}&vs_currencies={currency}&include_24h_change=true";

/// Errors that can occur while loading a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level firmware configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Identity of the fallback access point.
    pub access_point: AccessPointConfig,

    /// Wait applied after requesting a station association with stored credentials.
    pub station_wait: WaitPolicy,

    /// Wait applied to each open network candidate.
    pub open_network_wait: WaitPolicy,

    /// Maximum number of scan records considered.
    pub max_scan_results: usize,

    /// Price endpoint with `{asset}` and `{currency}` placeholders.
    pub price_url_template: String,

    /// Largest price response accepted, in bytes.
    pub max_response_bytes: usize,

    /// Delay between the save confirmation and the restart, in seconds.
    pub restart_grace_secs: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            access_point: AccessPointConfig::default(),
            station_wait: WaitPolicy::new(10, 1000),
            open_network_wait: WaitPolicy::new(5, 1000),
            max_scan_results: 20,
            price_url_template: DEFAULT_PRICE_URL.to_string(),
            max_response_bytes: 1024,
            restart_grace_secs: 5,
        }
    }
}

impl TickerConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.price_url_template.contains(ASSET_PLACEHOLDER)
            || !self.price_url_template.contains(CURRENCY_PLACEHOLDER)
        {
            return Err(ConfigError::Invalid(format!(
                "price_url_template must contain {} and {}",
                ASSET_PLACEHOLDER, CURRENCY_PLACEHOLDER
            )));
        }
        if self.access_point.ssid.is_empty() || self.access_point.ssid.len() > 32 {
            return Err(ConfigError::Invalid(
                "access_point.ssid must be 1-32 bytes".to_string(),
            ));
        }
        if self.access_point.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "access_point.max_connections must be at least 1".to_string(),
            ));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_response_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Grace period before restarting after a successful save.
    pub fn restart_grace(&self) -> Duration {
        Duration::from_secs(self.restart_grace_secs)
    }
}

/// Identity of the open access point started when no network is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPointConfig {
    pub ssid: String,
    pub channel: u8,
    /// Simultaneous client associations allowed.
    pub max_connections: u16,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: "CryptoDongle".to_string(),
            channel: 1,
            max_connections: 4,
        }
    }
}

/// A bounded wait: `attempts` sleeps of `period_ms` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub attempts: u32,
    pub period_ms: u64,
}

impl WaitPolicy {
    pub const fn new(attempts: u32, period_ms: u64) -> Self {
        Self {
            attempts,
            period_ms,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Upper bound on the time spent in this wait, saturating.
    pub fn ceiling(&self) -> Duration {
        self.period()
            .checked_mul(self.attempts)
            .unwrap_or(Duration::MAX)
    }
}
