//! Price quotes and the upstream price API.
//!
//! The endpoint answers with a small JSON document keyed by asset and then
//! by currency:
//!
//! ```json
//! { "ETH": { "EUR": 2500.5, "24h_change": -1.3 } }
//! ```
//!
//! The upstream uses lower-case keys and spells the change field
//! `<currency>_24h_change`; both spellings are accepted and keys are
//! matched without regard to ASCII case.

use serde_json::Value;
use tracing::debug;

use crate::config::{TickerConfig, ASSET_PLACEHOLDER, CURRENCY_PLACEHOLDER};
use crate::settings::{AssetSymbol, CurrencyCode};

const CHANGE_FIELD: &str = "24h_change";

/// A price reading for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: AssetSymbol,
    pub price: f64,
    pub change_24h_percent: f64,
}

/// Errors that make a poll cycle skip its display update.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response has no numeric `{0}` field")]
    MissingField(String),
}

/// Blocking HTTP GET.
pub trait HttpClient: Send {
    /// Fetch `url` and return the response body.
    ///
    /// Implementations report non-2xx responses as [`FetchError::Status`].
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Anything that can produce a [`Quote`] for an asset/currency pair.
pub trait QuoteSource: Send {
    fn fetch(&self, asset: &AssetSymbol, currency: &CurrencyCode) -> Result<Quote, FetchError>;
}

/// Quote source backed by the HTTP price endpoint.
pub struct PriceApi<H> {
    http: H,
    url_template: String,
    max_response_bytes: usize,
}

impl<H: HttpClient> PriceApi<H> {
    pub fn new(http: H, config: &TickerConfig) -> Self {
        Self {
            http,
            url_template: config.price_url_template.clone(),
            max_response_bytes: config.max_response_bytes,
        }
    }

    /// Request URL for a pair.
    pub fn url(&self, asset: &str, currency: &str) -> String {
        price_url(&self.url_template, asset, currency)
    }
}

impl<H: HttpClient> QuoteSource for PriceApi<H> {
    fn fetch(&self, asset: &AssetSymbol, currency: &CurrencyCode) -> Result<Quote, FetchError> {
        let url = self.url(asset, currency);
        debug!("GET {}", url);

        let body = self.http.get(&url)?;
        if body.len() > self.max_response_bytes {
            return Err(FetchError::ResponseTooLarge {
                limit: self.max_response_bytes,
            });
        }
        decode_quote(&body, asset, currency)
    }
}

/// Substitute the lower-cased pair into a URL template.
pub fn price_url(template: &str, asset: &str, currency: &str) -> String {
    template
        .replace(ASSET_PLACEHOLDER, &asset.to_ascii_lowercase())
        .replace(CURRENCY_PLACEHOLDER, &currency.to_ascii_lowercase())
}

/// Extract a quote from a price response.
pub fn decode_quote(
    body: &[u8],
    asset: &AssetSymbol,
    currency: &CurrencyCode,
) -> Result<Quote, FetchError> {
    let root: Value = serde_json::from_slice(body)?;

    let entry = field(&root, asset).ok_or_else(|| FetchError::MissingField(asset.to_string()))?;

    let price = field(entry, currency)
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::MissingField(currency.to_string()))?;

    let change = field(entry, CHANGE_FIELD)
        .or_else(|| field(entry, &format!("{}_{}", currency, CHANGE_FIELD)))
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::MissingField(CHANGE_FIELD.to_string()))?;

    Ok(Quote {
        symbol: asset.clone(),
        price,
        change_24h_percent: change,
    })
}

/// Object member lookup, exact key first, then ASCII case-insensitive.
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let object = value.as_object()?;
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::bounded;
    use crate::sim::CannedHttp;
    use pretty_assertions::assert_eq;

    fn pair(asset: &str, currency: &str) -> (AssetSymbol, CurrencyCode) {
        (bounded(asset).unwrap(), bounded(currency).unwrap())
    }

    #[test]
    fn test_decode_upper_case_response() {
        let (asset, currency) = pair("ETH", "EUR");
        let quote = decode_quote(
            br#"{"ETH":{"EUR":2500.5,"24h_change":-1.3}}"#,
            &asset,
            &currency,
        )
        .unwrap();

        assert_eq!(quote.symbol.as_str(), "ETH");
        assert_eq!(quote.price, 2500.5);
        assert_eq!(quote.change_24h_percent, -1.3);
    }

    #[test]
    fn test_decode_upstream_lower_case_response() {
        let (asset, currency) = pair("BTC", "USD");
        let quote = decode_quote(
            br#"{"btc":{"usd":67012,"usd_24h_change":2.25}}"#,
            &asset,
            &currency,
        )
        .unwrap();

        assert_eq!(quote.price, 67012.0);
        assert_eq!(quote.change_24h_percent, 2.25);
    }

    #[test]
    fn test_missing_change_is_an_error() {
        let (asset, currency) = pair("ETH", "EUR");
        let result = decode_quote(br#"{"ETH":{"EUR":2500.5}}"#, &asset, &currency);
        assert!(matches!(result, Err(FetchError::MissingField(f)) if f == "24h_change"));
    }

    #[test]
    fn test_missing_price_or_asset_is_an_error() {
        let (asset, currency) = pair("ETH", "EUR");

        let result = decode_quote(br#"{"ETH":{"USD":1.0,"24h_change":0}}"#, &asset, &currency);
        assert!(matches!(result, Err(FetchError::MissingField(f)) if f == "EUR"));

        let result = decode_quote(br#"{}"#, &asset, &currency);
        assert!(matches!(result, Err(FetchError::MissingField(f)) if f == "ETH"));
    }

    #[test]
    fn test_non_numeric_price_is_an_error() {
        let (asset, currency) = pair("ETH", "EUR");
        let result = decode_quote(
            br#"{"ETH":{"EUR":"2500.5","24h_change":1}}"#,
            &asset,
            &currency,
        );
        assert!(matches!(result, Err(FetchError::MissingField(_))));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let (asset, currency) = pair("ETH", "EUR");
        let result = decode_quote(b"<html>rate limited</html>", &asset, &currency);
        assert!(matches!(result, Err(FetchError::Json(_))));
    }

    #[test]
    fn test_url_is_lower_cased() {
        assert_eq!(
            price_url("http://prices/{asset}/{currency}", "DOGE", "EUR"),
            "http://prices/doge/eur"
        );
    }

    #[test]
    fn test_price_api_fetches_configured_url() {
        let config = TickerConfig::default();
        let http = CannedHttp::new();
        let api = PriceApi::new(http.clone(), &config);
        let url = api.url("SOL", "USD");
        http.respond(&url, br#"{"sol":{"usd":150.25,"usd_24h_change":-4}}"#);

        let (asset, currency) = pair("SOL", "USD");
        let quote = api.fetch(&asset, &currency).unwrap();

        assert_eq!(quote.price, 150.25);
        assert_eq!(http.requests(), vec![url]);
        assert!(http.requests()[0].contains("symbols=sol&vs_currencies=usd"));
    }

    #[test]
    fn test_oversized_response_rejected() {
        let config = TickerConfig {
            max_response_bytes: 16,
            ..Default::default()
        };
        let http = CannedHttp::new();
        let api = PriceApi::new(http.clone(), &config);
        http.respond(
            &api.url("ETH", "EUR"),
            br#"{"ETH":{"EUR":2500.5,"24h_change":-1.3}}"#,
        );

        let (asset, currency) = pair("ETH", "EUR");
        assert!(matches!(
            api.fetch(&asset, &currency),
            Err(FetchError::ResponseTooLarge { limit: 16 })
        ));
    }

    #[test]
    fn test_transport_failure_propagates() {
        let api = PriceApi::new(CannedHttp::new(), &TickerConfig::default());
        let (asset, currency) = pair("ETH", "EUR");
        assert!(matches!(
            api.fetch(&asset, &currency),
            Err(FetchError::Transport(_))
        ));
    }
}
