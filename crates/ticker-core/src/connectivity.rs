//! Network bootstrap.
//!
//! At power-on the device tries, in order and without going back:
//! 1. station mode with the stored credentials,
//! 2. every open network found by a scan, in scan order,
//! 3. its own open access point, which puts the device in serving mode.
//!
//! The outcome is a single [`Mode`] value. Whoever calls
//! [`ConnectivityManager::bootstrap`] hands it to exactly one loop; the mode
//! is never re-evaluated without a restart.
//!
//! Link state is driven by asynchronous radio events delivered through an
//! [`EventSink`]. The manager only observes that state during its bounded
//! waits, which are the sole suspension points of the bootstrap.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{AccessPointConfig, TickerConfig, WaitPolicy};
use crate::settings::{
    bounded, CapacityError, Credentials, KeyValueStore, Passphrase, SettingsStore, Ssid,
};

/// Link state of the single network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    StationConnecting,
    StationConnected,
    OpenNetworkConnecting,
    OpenNetworkConnected,
    AccessPointActive,
}

impl ConnectivityState {
    /// True when associated to an upstream network.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectivityState::StationConnected | ConnectivityState::OpenNetworkConnected
        )
    }
}

/// Operating mode decided once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Access point up, configuration portal running, no polling.
    Serving,
    /// Connected upstream, quote poller running, no portal.
    Polling,
}

/// Notifications from the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The station associated with an access point.
    Associated,
    /// The station lost (or failed to establish) its association.
    Disassociated,
    ScanComplete,
    /// A client joined our access point.
    ClientJoined,
    /// A client left our access point.
    ClientLeft,
}

/// Authentication advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Open,
    Protected,
}

/// One record of a network scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointInfo {
    pub ssid: Ssid,
    pub channel: u8,
    pub signal_strength: i8,
    pub security: Security,
}

impl AccessPointInfo {
    pub fn new(ssid: &str, security: Security) -> Result<Self, CapacityError> {
        Ok(Self {
            ssid: bounded(ssid)?,
            channel: 0,
            signal_strength: 0,
            security,
        })
    }

    pub fn is_open(&self) -> bool {
        self.security == Security::Open
    }
}

/// Station-mode association parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub security: Security,
}

impl StationConfig {
    /// Configuration for a network without authentication.
    pub fn open(ssid: Ssid) -> Self {
        Self {
            ssid,
            passphrase: Passphrase::new(),
            security: Security::Open,
        }
    }
}

impl From<&Credentials> for StationConfig {
    fn from(credentials: &Credentials) -> Self {
        let security = if credentials.is_open() {
            Security::Open
        } else {
            Security::Protected
        };
        Self {
            ssid: credentials.ssid.clone(),
            passphrase: credentials.passphrase.clone(),
            security,
        }
    }
}

/// Errors reported by a [`NetworkInterface`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("Interface initialisation failed: {0}")]
    Init(String),

    #[error("Failed to apply configuration: {0}")]
    Configure(String),

    #[error("Failed to request association: {0}")]
    Connect(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Failed to start access point: {0}")]
    AccessPoint(String),
}

/// Unrecoverable bootstrap failures.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The radio could not be brought up at all.
    #[error("Network interface failed to initialise")]
    InterfaceInit(#[source] NetworkError),

    /// The last fallback failed.
    #[error("Access point failed to start")]
    AccessPoint(#[source] NetworkError),
}

/// Control of the single wireless interface.
///
/// Association is asynchronous: [`connect`](NetworkInterface::connect) only
/// requests it, and the outcome arrives as a [`NetworkEvent`] on the sink
/// passed to [`init`](NetworkInterface::init).
pub trait NetworkInterface: Send {
    /// Bring the interface up in station mode and start delivering events.
    fn init(&mut self, events: EventSink) -> Result<(), NetworkError>;

    fn configure_station(&mut self, config: &StationConfig) -> Result<(), NetworkError>;

    fn connect(&mut self) -> Result<(), NetworkError>;

    fn disconnect(&mut self) -> Result<(), NetworkError>;

    /// Blocking scan, records in driver order.
    fn scan(&mut self) -> Result<Vec<AccessPointInfo>, NetworkError>;

    /// Switch to access point mode.
    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError>;
}

/// Shared link state, updated from the radio's event context.
#[derive(Debug, Clone)]
pub struct EventSink {
    state: Arc<Mutex<ConnectivityState>>,
}

impl EventSink {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectivityState::Disconnected)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectivityState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fold a radio event into the link state.
    pub fn notify(&self, event: NetworkEvent) {
        let mut state = self.lock();
        let next = match (*state, event) {
            (ConnectivityState::StationConnecting, NetworkEvent::Associated) => {
                ConnectivityState::StationConnected
            }
            (ConnectivityState::OpenNetworkConnecting, NetworkEvent::Associated) => {
                ConnectivityState::OpenNetworkConnected
            }
            (current, NetworkEvent::Disassociated) if current.is_connected() => {
                warn!("Lost association ({:?})", current);
                ConnectivityState::Disconnected
            }
            (_, NetworkEvent::ClientJoined) => {
                info!("Client joined access point");
                *state
            }
            (_, NetworkEvent::ClientLeft) => {
                info!("Client left access point");
                *state
            }
            (current, event) => {
                debug!("Ignoring {:?} in {:?}", event, current);
                current
            }
        };
        if next != *state {
            debug!("{:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Current link state.
    pub fn state(&self) -> ConnectivityState {
        *self.lock()
    }

    fn set(&self, state: ConnectivityState) {
        *self.lock() = state;
    }
}

/// Keep at most `limit` scan records, then only those without authentication.
///
/// Driver order is preserved.
pub fn open_candidates(records: Vec<AccessPointInfo>, limit: usize) -> Vec<AccessPointInfo> {
    records
        .into_iter()
        .take(limit)
        .filter(AccessPointInfo::is_open)
        .collect()
}

/// Owns the network interface and runs the bootstrap decision tree.
pub struct ConnectivityManager<N, C> {
    iface: N,
    clock: C,
    events: EventSink,
    access_point: AccessPointConfig,
    station_wait: WaitPolicy,
    open_network_wait: WaitPolicy,
    max_scan_results: usize,
}

impl<N: NetworkInterface, C: Clock> ConnectivityManager<N, C> {
    pub fn new(iface: N, clock: C, config: &TickerConfig) -> Self {
        Self {
            iface,
            clock,
            events: EventSink::new(),
            access_point: config.access_point.clone(),
            station_wait: config.station_wait,
            open_network_wait: config.open_network_wait,
            max_scan_results: config.max_scan_results,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.events.state()
    }

    /// Handle for feeding radio events into this manager.
    pub fn events(&self) -> EventSink {
        self.events.clone()
    }

    pub fn interface(&self) -> &N {
        &self.iface
    }

    /// Release the interface once the mode is decided. The link stays up
    /// for as long as the caller keeps it.
    pub fn into_interface(self) -> N {
        self.iface
    }

    /// Decide the operating mode.
    ///
    /// Only a failure to bring the interface up (or to start the final
    /// access point) is reported; every other failure falls through to the
    /// next method.
    pub fn bootstrap<K: KeyValueStore>(
        &mut self,
        settings: &SettingsStore<K>,
    ) -> Result<Mode, BootstrapError> {
        self.iface
            .init(self.events.clone())
            .map_err(BootstrapError::InterfaceInit)?;

        match settings.credentials() {
            Some(credentials) => {
                if self.try_station(&credentials) {
                    return Ok(Mode::Polling);
                }
            }
            None => info!("No stored credentials"),
        }

        if self.try_open_networks() {
            return Ok(Mode::Polling);
        }

        self.start_access_point()?;
        Ok(Mode::Serving)
    }

    fn try_station(&mut self, credentials: &Credentials) -> bool {
        info!("Connecting to '{}'...", credentials.ssid);
        let config = StationConfig::from(credentials);
        let connected = self.attempt(
            &config,
            ConnectivityState::StationConnecting,
            self.station_wait,
        );
        if connected {
            info!("Connected to '{}'", credentials.ssid);
        } else {
            warn!(
                "Could not join '{}' within {:?}",
                credentials.ssid,
                self.station_wait.ceiling()
            );
        }
        connected
    }

    fn try_open_networks(&mut self) -> bool {
        info!("Scanning for open networks...");
        let records = match self.iface.scan() {
            Ok(records) => records,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        let candidates = open_candidates(records, self.max_scan_results);
        info!("Found {} open network(s)", candidates.len());

        for candidate in candidates {
            info!(
                "Trying open network '{}' (channel {}, {} dBm)",
                candidate.ssid, candidate.channel, candidate.signal_strength
            );
            let config = StationConfig::open(candidate.ssid.clone());
            if self.attempt(
                &config,
                ConnectivityState::OpenNetworkConnecting,
                self.open_network_wait,
            ) {
                info!("Connected to open network '{}'", candidate.ssid);
                return true;
            }
            debug!("Open network '{}' did not associate", candidate.ssid);
        }
        false
    }

    fn start_access_point(&mut self) -> Result<(), BootstrapError> {
        self.iface
            .start_access_point(&self.access_point)
            .map_err(|e| {
                error!("{}", e);
                BootstrapError::AccessPoint(e)
            })?;
        self.events.set(ConnectivityState::AccessPointActive);
        info!(
            "Access point '{}' up on channel {} (max {} clients)",
            self.access_point.ssid, self.access_point.channel, self.access_point.max_connections
        );
        Ok(())
    }

    /// One association attempt with a bounded wait.
    ///
    /// A failed attempt is disconnected so it cannot complete later.
    fn attempt(
        &mut self,
        config: &StationConfig,
        connecting: ConnectivityState,
        wait: WaitPolicy,
    ) -> bool {
        self.events.set(connecting);

        let requested = self
            .iface
            .configure_station(config)
            .and_then(|_| self.iface.connect());

        let connected = match requested {
            Ok(()) => self.wait_for_link(wait),
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        if !connected {
            if let Err(e) = self.iface.disconnect() {
                debug!("{}", e);
            }
            self.events.set(ConnectivityState::Disconnected);
        }
        connected
    }

    fn wait_for_link(&self, wait: WaitPolicy) -> bool {
        for _ in 0..wait.attempts {
            if self.state().is_connected() {
                return true;
            }
            self.clock.sleep(wait.period());
        }
        self.state().is_connected()
    }
}
