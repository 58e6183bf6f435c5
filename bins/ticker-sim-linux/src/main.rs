//! Runs the ticker firmware on a Linux host.
//!
//! The radio is simulated from the command line, settings live in a JSON
//! file, quotes come from the real price endpoint and the display is the
//! terminal. In access point mode the portal is served with axum.

mod device;
mod display;
mod http;
mod portal;
mod store;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ticker_core::connectivity::{AccessPointInfo, Security};
use ticker_core::sim::{SimNetwork, SimScenario};
use ticker_core::{
    ConfigService, ConnectivityManager, Mode, PriceApi, QuotePoller, SettingsStore, SystemClock,
    TickerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::device::ProcessDevice;
use crate::display::TerminalDisplay;
use crate::http::ReqwestClient;
use crate::portal::AxumPortal;
use crate::store::FileStore;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "ticker-sim", version, about = "Crypto ticker firmware simulator")]
struct Args {
    /// Settings file standing in for flash storage
    #[arg(long, default_value = "ticker-settings.json")]
    store: PathBuf,

    /// JSON file overriding firmware parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Protected network in range that accepts these credentials
    #[arg(long, value_name = "SSID:PASSPHRASE")]
    network: Option<String>,

    /// Open network in range that accepts clients (repeatable)
    #[arg(long = "open-network", value_name = "SSID")]
    open_networks: Vec<String>,

    /// Open network in range that never associates (repeatable)
    #[arg(long = "dead-network", value_name = "SSID")]
    dead_networks: Vec<String>,

    /// Address the configuration portal listens on
    #[arg(long, default_value = "127.0.0.1:8080")]
    portal: SocketAddr,
}

impl Args {
    fn scenario(&self) -> anyhow::Result<SimScenario> {
        let mut scenario = SimScenario::default();

        if let Some(network) = &self.network {
            let (ssid, passphrase) = network
                .split_once(':')
                .context("--network must be SSID:PASSPHRASE")?;
            scenario
                .visible
                .push(AccessPointInfo::new(ssid, Security::Protected)?);
            scenario.accepted_credentials = Some((ssid.to_string(), passphrase.to_string()));
        }
        for ssid in &self.open_networks {
            scenario
                .visible
                .push(AccessPointInfo::new(ssid, Security::Open)?);
            scenario.joinable_open.push(ssid.clone());
        }
        for ssid in &self.dead_networks {
            scenario
                .visible
                .push(AccessPointInfo::new(ssid, Security::Open)?);
        }
        Ok(scenario)
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TickerConfig> {
    let Some(path) = path else {
        return Ok(TickerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    TickerConfig::from_json(&json).with_context(|| format!("Invalid config {}", path.display()))
}

/// Boot the device. Returns only when the portal should be served.
fn start(args: &Args, config: &TickerConfig) -> anyhow::Result<AxumPortal> {
    let kv = FileStore::open(&args.store).context("Failed to open settings store")?;
    let mut settings = SettingsStore::new(kv);
    match settings.ensure_defaults() {
        Ok(true) => tracing::info!("Wrote default settings"),
        Ok(false) => {}
        Err(e) => tracing::warn!("Could not write default settings: {}", e),
    }

    let mut manager =
        ConnectivityManager::new(SimNetwork::new(args.scenario()?), SystemClock::new(), config);
    let mode = manager
        .bootstrap(&settings)
        .context("Network bootstrap failed")?;
    tracing::info!("Mode: {:?}", mode);

    match mode {
        Mode::Polling => {
            let http = ReqwestClient::new(HTTP_TIMEOUT).context("Failed to build HTTP client")?;
            QuotePoller::new(
                settings,
                PriceApi::new(http, config),
                TerminalDisplay::stdout(),
                SystemClock::new(),
            )
            .run_forever()
        }
        Mode::Serving => {
            let mut portal = AxumPortal::new();
            ConfigService::new(settings, SystemClock::new(), ProcessDevice::current()?, config)
                .mount(&mut portal)?;
            tracing::info!(
                "Join '{}' and open http://{}/ to configure",
                config.access_point.ssid,
                args.portal
            );
            Ok(portal)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ticker_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    tracing::info!("Crypto ticker simulator starting...");

    let addr = args.portal;
    // Bootstrap and polling block, so they stay off the async workers.
    let portal = tokio::task::spawn_blocking(move || start(&args, &config)).await??;
    portal.serve(addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
