//! Crypto ticker firmware for ESP32.
//!
//! Requires the ESP32 Rust toolchain. The panel is an SSD1306 on I2C0
//! (SDA GPIO21, SCL GPIO22).

use std::thread;
use std::time::Duration;

use anyhow::Context;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};
use ticker_core::{
    ConfigService, ConnectivityManager, Mode, PriceApi, QuotePoller, SettingsStore, SystemClock,
    TickerConfig,
};
use ticker_esp32::display::OledDisplay;
use ticker_esp32::http::{EspHttpClient, EspPortalServer};
use ticker_esp32::nvs::NvsStore;
use ticker_esp32::system::EspDevice;
use ticker_esp32::wifi::EspNetwork;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();
    info!("Crypto ticker starting...");

    let config = TickerConfig::default();
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut settings = SettingsStore::new(NvsStore::open(nvs.clone())?);
    match settings.ensure_defaults() {
        Ok(true) => info!("Wrote default settings"),
        Ok(false) => {}
        Err(e) => warn!("Could not write default settings: {}", e),
    }

    let network = EspNetwork::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut manager = ConnectivityManager::new(network, SystemClock::new(), &config);
    let mode = manager
        .bootstrap(&settings)
        .context("Network bootstrap failed")?;
    info!("Mode: {:?}", mode);

    // The radio stays up for the life of the firmware.
    let mut network = manager.into_interface();

    match mode {
        Mode::Polling => {
            if let Err(e) = network.wait_ip() {
                warn!("No IP address yet: {:?}", e);
            }

            let i2c = I2cDriver::new(
                peripherals.i2c0,
                peripherals.pins.gpio21,
                peripherals.pins.gpio22,
                &I2cConfig::new().baudrate(400.kHz().into()),
            )?;
            let display = OledDisplay::new(i2c).context("Display init failed")?;
            let http = EspHttpClient::new(HTTP_TIMEOUT, config.max_response_bytes);

            QuotePoller::new(
                settings,
                PriceApi::new(http, &config),
                display,
                SystemClock::new(),
            )
            .run_forever()
        }
        Mode::Serving => {
            let mut server = EspPortalServer::new()?;
            ConfigService::new(settings, SystemClock::new(), EspDevice, &config)
                .mount(&mut server)?;
            match network.access_point_ip() {
                Ok(ip) => info!(
                    "Join '{}' and open http://{}/ to configure",
                    config.access_point.ssid, ip
                ),
                Err(e) => warn!("Access point address unknown: {:?}", e),
            }

            // Serving ends with the restart scheduled by a successful save.
            let _keep = (server, network);
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }
    }
}
