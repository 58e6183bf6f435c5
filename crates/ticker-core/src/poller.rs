//! Steady-state quote loop for polling mode.
//!
//! Each cycle reads the asset and currency, fetches a quote, renders it,
//! then reads the interval and sleeps. Settings are read fresh every cycle.
//! A failed cycle is logged and leaves the last reading on screen; the loop
//! never gives up and never retries early.

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::display::{render_quote, DisplayError, TextDisplay};
use crate::quote::{FetchError, Quote, QuoteSource};
use crate::settings::{KeyValueStore, SettingsStore};

/// Why a cycle skipped its display update.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Render failed: {0}")]
    Display(#[from] DisplayError),
}

/// Fetches quotes and drives the display.
pub struct QuotePoller<K, Q, D, C> {
    settings: SettingsStore<K>,
    source: Q,
    display: D,
    clock: C,
}

impl<K, Q, D, C> QuotePoller<K, Q, D, C>
where
    K: KeyValueStore,
    Q: QuoteSource,
    D: TextDisplay,
    C: Clock,
{
    pub fn new(settings: SettingsStore<K>, source: Q, display: D, clock: C) -> Self {
        Self {
            settings,
            source,
            display,
            clock,
        }
    }

    /// Fetch and render one quote, without waiting.
    pub fn poll_once(&mut self) -> Result<Quote, CycleError> {
        let asset = self.settings.asset_symbol();
        let currency = self.settings.currency_code();

        let quote = self.source.fetch(&asset, &currency)?;
        render_quote(&mut self.display, &quote, &currency)?;
        Ok(quote)
    }

    /// One full cycle: poll, then wait the configured interval.
    pub fn step(&mut self) {
        match self.poll_once() {
            Ok(quote) => info!(
                "{} {:.2} ({:+.2}% 24h)",
                quote.symbol, quote.price, quote.change_24h_percent
            ),
            Err(e) => warn!("Skipping display update: {}", e),
        }

        let interval = self.settings.refresh_interval();
        debug!("Next quote in {:?}", interval);
        self.clock.sleep(interval);
    }

    pub fn run_forever(mut self) -> ! {
        info!(
            "Polling {}/{}",
            self.settings.asset_symbol(),
            self.settings.currency_code()
        );
        loop {
            self.step();
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TickerConfig;
    use crate::display::{CHANGE_LINE, PRICE_LINE};
    use crate::quote::PriceApi;
    use crate::settings::{KEY_ASSET, KEY_CURRENCY, KEY_INTERVAL};
    use crate::sim::{CannedHttp, DisplayOp, ManualClock, MemoryStore, RecordingDisplay};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    type TestPoller = QuotePoller<MemoryStore, PriceApi<CannedHttp>, RecordingDisplay, ManualClock>;

    fn poller(kv: &MemoryStore, http: &CannedHttp, clock: &ManualClock) -> TestPoller {
        QuotePoller::new(
            SettingsStore::new(kv.clone()),
            PriceApi::new(http.clone(), &TickerConfig::default()),
            RecordingDisplay::new(),
            clock.clone(),
        )
    }

    fn eth_eur_store() -> MemoryStore {
        let kv = MemoryStore::new();
        kv.insert_str(KEY_ASSET, "ETH");
        kv.insert_str(KEY_CURRENCY, "EUR");
        kv.insert_u32(KEY_INTERVAL, 30);
        kv
    }

    fn eth_eur_url() -> String {
        PriceApi::new(CannedHttp::new(), &TickerConfig::default()).url("ETH", "EUR")
    }

    #[test]
    fn test_cycle_renders_quote_and_waits_interval() {
        let kv = eth_eur_store();
        let clock = ManualClock::new();
        let http = CannedHttp::timed(clock.clone());
        http.respond(&eth_eur_url(), br#"{"ETH":{"EUR":2500.5,"24h_change":-1.3}}"#);
        let mut poller = poller(&kv, &http, &clock);

        poller.step();

        assert_eq!(
            poller.display().ops(),
            vec![
                DisplayOp::Clear,
                DisplayOp::Line(PRICE_LINE, "ETH: 2500.50 EUR".to_string()),
                DisplayOp::Line(CHANGE_LINE, "24h: -1.30%".to_string()),
                DisplayOp::Flush,
            ]
        );
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
        assert_eq!(http.request_times(), vec![Duration::ZERO]);

        poller.step();
        assert_eq!(
            http.request_times(),
            vec![Duration::ZERO, Duration::from_secs(30)]
        );
    }

    #[test]
    fn test_failed_fetch_keeps_previous_reading() {
        let kv = eth_eur_store();
        let http = CannedHttp::new();
        let url = eth_eur_url();
        http.respond(&url, br#"{"ETH":{"EUR":2500.5,"24h_change":-1.3}}"#);
        let clock = ManualClock::new();
        let mut poller = poller(&kv, &http, &clock);

        poller.step();
        let shown = poller.display().ops();

        http.fail(&url, 503);
        poller.step();

        assert_eq!(poller.display().ops(), shown);
        assert_eq!(clock.now(), Duration::from_secs(60));
    }

    #[test]
    fn test_missing_change_skips_display() {
        let kv = eth_eur_store();
        let http = CannedHttp::new();
        http.respond(&eth_eur_url(), br#"{"ETH":{"EUR":2500.5}}"#);
        let clock = ManualClock::new();
        let mut poller = poller(&kv, &http, &clock);

        assert!(matches!(
            poller.poll_once(),
            Err(CycleError::Fetch(FetchError::MissingField(_)))
        ));
        assert!(poller.display().ops().is_empty());
    }

    #[test]
    fn test_unreachable_endpoint_keeps_cadence() {
        let kv = eth_eur_store();
        let http = CannedHttp::new();
        let clock = ManualClock::new();
        let mut poller = poller(&kv, &http, &clock);

        for _ in 0..5 {
            poller.step();
        }

        assert!(poller.display().ops().is_empty());
        assert_eq!(http.requests().len(), 5);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30); 5]);
    }

    #[test]
    fn test_settings_read_fresh_each_cycle() {
        let kv = eth_eur_store();
        let http = CannedHttp::new();
        let clock = ManualClock::new();
        let mut poller = poller(&kv, &http, &clock);

        poller.step();
        kv.insert_str(KEY_ASSET, "SOL");
        kv.insert_u32(KEY_INTERVAL, 120);
        poller.step();

        let requests = http.requests();
        assert!(requests[0].contains("symbols=eth"));
        assert!(requests[1].contains("symbols=sol"));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(30), Duration::from_secs(120)]
        );
    }

    #[test]
    fn test_defaults_used_when_store_empty() {
        let kv = MemoryStore::new();
        let http = CannedHttp::new();
        let clock = ManualClock::new();
        let mut poller = poller(&kv, &http, &clock);

        poller.step();

        assert!(http.requests()[0].contains("symbols=btc&vs_currencies=usd"));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }
}
