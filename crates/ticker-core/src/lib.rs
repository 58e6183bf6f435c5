//! # ticker-core
//!
//! Core logic for the crypto ticker appliance.
//!
//! This crate provides:
//! - Typed access to the persisted settings (credentials, asset, currency, interval)
//! - The connectivity bootstrap (station, open network, access point fallback)
//! - The quote poller that drives the display in polling mode
//! - The configuration portal served in access point mode
//! - In-memory implementations of every hardware capability (`sim`)
//!
//! Every piece of hardware is reached through a narrow trait, so the same
//! code runs on ESP32 (esp-idf) and on Linux (the simulator), and all of it
//! is testable on the host. There is no async code in this crate: waits are
//! blocking and go through [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod display;
pub mod form;
pub mod persist;
pub mod poller;
pub mod portal;
pub mod quote;
pub mod settings;
pub mod sim;

pub use clock::{Clock, SystemClock};
pub use config::TickerConfig;
pub use connectivity::{
    BootstrapError, ConnectivityManager, ConnectivityState, EventSink, Mode, NetworkEvent,
    NetworkInterface,
};
pub use device::Device;
pub use display::TextDisplay;
pub use poller::QuotePoller;
pub use portal::{ConfigService, HttpServer};
pub use quote::{HttpClient, PriceApi, Quote, QuoteSource};
pub use settings::{KeyValueStore, Settings, SettingsStore};
