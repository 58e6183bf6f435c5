//! WiFi radio for ESP32.
//!
//! Association outcomes come from the system event loop rather than from
//! the blocking `connect`, so the bootstrap's bounded waits decide how long
//! an attempt may take.

use std::net::Ipv4Addr;

use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::{modem::Modem, peripheral::Peripheral},
    nvs::EspDefaultNvsPartition,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi, WifiEvent,
    },
};
use log::{debug, info};
use ticker_core::config::AccessPointConfig;
use ticker_core::connectivity::{
    AccessPointInfo, NetworkError, NetworkInterface, Security, StationConfig,
};
use ticker_core::settings::bounded;
use ticker_core::{EventSink, NetworkEvent};

/// The single wireless interface, station or access point.
pub struct EspNetwork {
    wifi: BlockingWifi<EspWifi<'static>>,
    sysloop: EspSystemEventLoop,
    subscription: Option<EspSubscription<'static, System>>,
}

impl EspNetwork {
    pub fn new(
        modem: impl Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop.clone())?;
        Ok(Self {
            wifi,
            sysloop,
            subscription: None,
        })
    }

    /// Block until the station has an IP address.
    pub fn wait_ip(&mut self) -> anyhow::Result<()> {
        info!("Waiting for DHCP lease...");
        self.wifi.wait_netif_up()?;
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        info!("IP address: {}", ip_info.ip);
        Ok(())
    }

    /// Address clients of our access point reach us on.
    pub fn access_point_ip(&self) -> anyhow::Result<Ipv4Addr> {
        Ok(self.wifi.wifi().ap_netif().get_ip_info()?.ip)
    }
}

fn translate(event: &WifiEvent<'_>) -> Option<NetworkEvent> {
    match event {
        WifiEvent::StaConnected(..) => Some(NetworkEvent::Associated),
        WifiEvent::StaDisconnected(..) => Some(NetworkEvent::Disassociated),
        WifiEvent::ScanDone(..) => Some(NetworkEvent::ScanComplete),
        WifiEvent::ApStaConnected(..) => Some(NetworkEvent::ClientJoined),
        WifiEvent::ApStaDisconnected(..) => Some(NetworkEvent::ClientLeft),
        _ => None,
    }
}

fn security(auth_method: Option<AuthMethod>) -> Security {
    match auth_method {
        None | Some(AuthMethod::None) => Security::Open,
        Some(_) => Security::Protected,
    }
}

impl NetworkInterface for EspNetwork {
    fn init(&mut self, events: EventSink) -> Result<(), NetworkError> {
        let subscription = self
            .sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                if let Some(event) = translate(&event) {
                    events.notify(event);
                }
            })
            .map_err(|e| NetworkError::Init(e.to_string()))?;
        self.subscription = Some(subscription);

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(|e| NetworkError::Init(e.to_string()))?;
        self.wifi
            .start()
            .map_err(|e| NetworkError::Init(e.to_string()))?;
        debug!("WiFi started in station mode");
        Ok(())
    }

    fn configure_station(&mut self, config: &StationConfig) -> Result<(), NetworkError> {
        let auth_method = match config.security {
            Security::Open => AuthMethod::None,
            Security::Protected => AuthMethod::WPA2Personal,
        };
        let client = ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Configure("SSID too long".to_string()))?,
            password: config
                .passphrase
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Configure("Passphrase too long".to_string()))?,
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(client))
            .map_err(|e| NetworkError::Configure(e.to_string()))
    }

    fn connect(&mut self) -> Result<(), NetworkError> {
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|e| NetworkError::Connect(e.to_string()))
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.wifi
            .wifi_mut()
            .disconnect()
            .map_err(|e| NetworkError::Connect(e.to_string()))
    }

    fn scan(&mut self) -> Result<Vec<AccessPointInfo>, NetworkError> {
        let records = self
            .wifi
            .scan()
            .map_err(|e| NetworkError::Scan(e.to_string()))?;

        let mut found = Vec::with_capacity(records.len());
        for record in records {
            let Ok(ssid) = bounded(record.ssid.as_str()) else {
                continue;
            };
            found.push(AccessPointInfo {
                ssid,
                channel: record.channel,
                signal_strength: record.signal_strength,
                security: security(record.auth_method),
            });
        }
        Ok(found)
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError> {
        let ap = AccessPointConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::AccessPoint("SSID too long".to_string()))?,
            auth_method: AuthMethod::None,
            channel: config.channel,
            max_connections: config.max_connections,
            ..Default::default()
        };

        self.wifi
            .stop()
            .map_err(|e| NetworkError::AccessPoint(e.to_string()))?;
        self.wifi
            .set_configuration(&Configuration::AccessPoint(ap))
            .map_err(|e| NetworkError::AccessPoint(e.to_string()))?;
        self.wifi
            .start()
            .map_err(|e| NetworkError::AccessPoint(e.to_string()))
    }
}
