use tracing::debug;

use crate::config::AccessPointConfig;
use crate::connectivity::{
    AccessPointInfo, EventSink, NetworkError, NetworkEvent, NetworkInterface, Security,
    StationConfig,
};

/// What the simulated radio environment looks like.
#[derive(Debug, Clone, Default)]
pub struct SimScenario {
    pub fail_init: bool,
    /// The only SSID/passphrase pair a protected network accepts.
    pub accepted_credentials: Option<(String, String)>,
    /// Scan records, in the order the driver reports them.
    pub visible: Vec<AccessPointInfo>,
    /// Open networks that actually associate.
    pub joinable_open: Vec<String>,
    pub fail_scan: bool,
    pub fail_access_point: bool,
}

/// One call made on a [`SimNetwork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCall {
    Init,
    ConfigureStation { ssid: String, security: Security },
    Connect,
    Disconnect,
    Scan,
    StartAccessPoint { ssid: String, max_connections: u16 },
}

/// Scripted radio.
///
/// Association succeeds immediately on `connect` when the configured
/// network is accepted by the scenario, and never happens otherwise.
#[derive(Debug)]
pub struct SimNetwork {
    scenario: SimScenario,
    events: Option<EventSink>,
    station: Option<StationConfig>,
    calls: Vec<NetworkCall>,
}

impl SimNetwork {
    pub fn new(scenario: SimScenario) -> Self {
        Self {
            scenario,
            events: None,
            station: None,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> Vec<NetworkCall> {
        self.calls.clone()
    }

    /// SSIDs of the open networks configured, in order.
    pub fn attempted_ssids(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                NetworkCall::ConfigureStation {
                    ssid,
                    security: Security::Open,
                } => Some(ssid.clone()),
                _ => None,
            })
            .collect()
    }

    fn accepts(&self, station: &StationConfig) -> bool {
        let credentials_match = self
            .scenario
            .accepted_credentials
            .as_ref()
            .is_some_and(|(ssid, pass)| {
                station.ssid.as_str() == ssid && station.passphrase.as_str() == pass
            });
        match station.security {
            Security::Protected => credentials_match,
            Security::Open => {
                credentials_match
                    || self
                        .scenario
                        .joinable_open
                        .iter()
                        .any(|ssid| station.ssid.as_str() == ssid)
            }
        }
    }
}

impl NetworkInterface for SimNetwork {
    fn init(&mut self, events: EventSink) -> Result<(), NetworkError> {
        self.calls.push(NetworkCall::Init);
        if self.scenario.fail_init {
            return Err(NetworkError::Init("simulated radio fault".to_string()));
        }
        self.events = Some(events);
        Ok(())
    }

    fn configure_station(&mut self, config: &StationConfig) -> Result<(), NetworkError> {
        self.calls.push(NetworkCall::ConfigureStation {
            ssid: config.ssid.to_string(),
            security: config.security,
        });
        self.station = Some(config.clone());
        Ok(())
    }

    fn connect(&mut self) -> Result<(), NetworkError> {
        self.calls.push(NetworkCall::Connect);
        let station = self
            .station
            .as_ref()
            .ok_or_else(|| NetworkError::Connect("station not configured".to_string()))?;

        if self.accepts(station) {
            debug!("Simulated association with '{}'", station.ssid);
            if let Some(events) = &self.events {
                events.notify(NetworkEvent::Associated);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.calls.push(NetworkCall::Disconnect);
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<AccessPointInfo>, NetworkError> {
        self.calls.push(NetworkCall::Scan);
        if self.scenario.fail_scan {
            return Err(NetworkError::Scan("simulated scan failure".to_string()));
        }
        if let Some(events) = &self.events {
            events.notify(NetworkEvent::ScanComplete);
        }
        Ok(self.scenario.visible.clone())
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError> {
        self.calls.push(NetworkCall::StartAccessPoint {
            ssid: config.ssid.clone(),
            max_connections: config.max_connections,
        });
        if self.scenario.fail_access_point {
            return Err(NetworkError::AccessPoint(
                "simulated access point failure".to_string(),
            ));
        }
        Ok(())
    }
}
