//! Whole-device control.

use log::warn;
use ticker_core::Device;

/// The chip itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspDevice;

impl Device for EspDevice {
    fn restart(&self) {
        warn!("Restarting...");
        unsafe { esp_idf_svc::sys::esp_restart() };
    }
}
