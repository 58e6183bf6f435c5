//! ESP32 implementations of the ticker's platform traits.
//!
//! - [`nvs::NvsStore`]: settings in the `storage` NVS namespace
//! - [`wifi::EspNetwork`]: the radio, with events fed from the system event loop
//! - [`http::EspHttpClient`]: HTTPS GET against the price endpoint
//! - [`http::EspPortalServer`]: the configuration portal on `EspHttpServer`
//! - [`display::OledDisplay`]: SSD1306 panel over I2C
//! - [`system::EspDevice`]: restart
//!
//! The firmware binary (`ticker-firmware-esp32`) wires these into
//! `ticker-core`.

pub mod display;
pub mod http;
pub mod nvs;
pub mod system;
pub mod wifi;
