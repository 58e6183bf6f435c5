//! `application/x-www-form-urlencoded` decoding for the settings form.

use crate::settings::{
    bounded, AssetSymbol, Credentials, CurrencyCode, Settings, ASSET_CAPACITY,
    CURRENCY_CAPACITY, DEFAULT_INTERVAL_SECS, PASSPHRASE_CAPACITY, SSID_CAPACITY,
    SUPPORTED_ASSETS, SUPPORTED_CURRENCIES,
};

pub const MIN_INTERVAL_SECS: u32 = 30;
pub const MAX_INTERVAL_SECS: u32 = 3600;

/// Rejected form submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Field `{0}` is not valid UTF-8")]
    Utf8(&'static str),

    #[error("Network name is required")]
    MissingSsid,

    #[error("Field `{field}` exceeds {capacity} bytes")]
    TooLong { field: &'static str, capacity: usize },

    #[error(
        "Interval must be a whole number between {} and {}, got `{}`",
        MIN_INTERVAL_SECS,
        MAX_INTERVAL_SECS,
        .0
    )]
    Interval(String),

    #[error("Unsupported asset `{0}`")]
    UnsupportedAsset(String),

    #[error("Unsupported currency `{0}`")]
    UnsupportedCurrency(String),
}

/// Raw decoded fields of a submission.
///
/// Absent fields stay `None`; unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub asset_symbol: Option<String>,
    pub currency: Option<String>,
    pub interval: Option<String>,
}

impl FormSubmission {
    /// Decode a urlencoded body.
    ///
    /// Pairs without `=` are skipped and the last occurrence of a key wins.
    pub fn parse(body: &[u8]) -> Result<Self, FormError> {
        let mut form = Self::default();

        for pair in body.split(|&b| b == b'&') {
            let Some(eq) = pair.iter().position(|&b| b == b'=') else {
                continue;
            };
            let (key, value) = (&pair[..eq], &pair[eq + 1..]);

            let Ok(key) = String::from_utf8(percent_decode(key)) else {
                continue;
            };
            let (field, slot) = match key.as_str() {
                "ssid" => ("ssid", &mut form.ssid),
                "password" => ("password", &mut form.password),
                "crypto" => ("crypto", &mut form.asset_symbol),
                "currency" => ("currency", &mut form.currency),
                "interval" => ("interval", &mut form.interval),
                _ => continue,
            };
            let value =
                String::from_utf8(percent_decode(value)).map_err(|_| FormError::Utf8(field))?;
            *slot = Some(value);
        }

        Ok(form)
    }

    /// Parsed interval; absent means the default.
    pub fn refresh_interval_secs(&self) -> Result<u32, FormError> {
        let Some(raw) = self.interval.as_deref() else {
            return Ok(DEFAULT_INTERVAL_SECS);
        };
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|secs| (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(secs))
            .ok_or_else(|| FormError::Interval(raw.to_string()))
    }

    /// Validate into settings ready to persist.
    ///
    /// A missing asset or currency falls back to the defaults; anything
    /// present must be one of the values the form offers.
    pub fn into_settings(self) -> Result<Settings, FormError> {
        let refresh_interval_secs = self.refresh_interval_secs()?;
        let defaults = Settings::default();

        let ssid = self
            .ssid
            .filter(|s| !s.is_empty())
            .ok_or(FormError::MissingSsid)?;
        let password = self.password.unwrap_or_default();
        let credentials = Credentials {
            ssid: bounded(&ssid).map_err(|_| FormError::TooLong {
                field: "ssid",
                capacity: SSID_CAPACITY,
            })?,
            passphrase: bounded(&password).map_err(|_| FormError::TooLong {
                field: "password",
                capacity: PASSPHRASE_CAPACITY,
            })?,
        };

        let asset_symbol = match self.asset_symbol {
            Some(asset) => supported_asset(&asset)?,
            None => defaults.asset_symbol,
        };
        let currency_code = match self.currency {
            Some(currency) => supported_currency(&currency)?,
            None => defaults.currency_code,
        };

        Ok(Settings {
            credentials: Some(credentials),
            asset_symbol,
            currency_code,
            refresh_interval_secs,
        })
    }
}

fn supported_asset(value: &str) -> Result<AssetSymbol, FormError> {
    if !SUPPORTED_ASSETS.contains(&value) {
        return Err(FormError::UnsupportedAsset(value.to_string()));
    }
    bounded(value).map_err(|_| FormError::TooLong {
        field: "crypto",
        capacity: ASSET_CAPACITY,
    })
}

fn supported_currency(value: &str) -> Result<CurrencyCode, FormError> {
    if !SUPPORTED_CURRENCIES.contains(&value) {
        return Err(FormError::UnsupportedCurrency(value.to_string()));
    }
    bounded(value).map_err(|_| FormError::TooLong {
        field: "currency",
        capacity: CURRENCY_CAPACITY,
    })
}

/// `+` becomes a space and `%XX` a byte. Malformed escapes pass through.
fn percent_decode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_digit(raw.get(i + 1)), hex_digit(raw.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_digit(byte: Option<&u8>) -> Option<u8> {
    char::from(*byte?).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_asset_and_interval() {
        let form = FormSubmission::parse(b"crypto=BTC&interval=120").unwrap();
        assert_eq!(form.asset_symbol.as_deref(), Some("BTC"));
        assert_eq!(form.refresh_interval_secs(), Ok(120));
        assert_eq!(form.ssid, None);
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let form = FormSubmission::parse(b"password=a%2Bb+c").unwrap();
        assert_eq!(form.password.as_deref(), Some("a+b c"));
    }

    #[test]
    fn test_malformed_escapes_kept_literally() {
        let form = FormSubmission::parse(b"ssid=50%25+off%&password=%zz%4").unwrap();
        assert_eq!(form.ssid.as_deref(), Some("50% off%"));
        assert_eq!(form.password.as_deref(), Some("%zz%4"));
    }

    #[test]
    fn test_last_occurrence_wins_and_junk_ignored() {
        let form = FormSubmission::parse(b"ssid=a&flag&color=red&ssid=b&=x").unwrap();
        assert_eq!(form.ssid.as_deref(), Some("b"));
    }

    #[test]
    fn test_value_with_equals_sign() {
        let form = FormSubmission::parse(b"password=a=b").unwrap();
        assert_eq!(form.password.as_deref(), Some("a=b"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let result = FormSubmission::parse(b"ssid=%C3%28");
        assert_eq!(result, Err(FormError::Utf8("ssid")));
    }

    #[test]
    fn test_into_settings() {
        let form = FormSubmission::parse(
            b"ssid=Home+Net&password=hunter22&crypto=ETH&currency=EUR&interval=30",
        )
        .unwrap();
        let settings = form.into_settings().unwrap();

        let credentials = settings.credentials.unwrap();
        assert_eq!(credentials.ssid.as_str(), "Home Net");
        assert_eq!(credentials.passphrase.as_str(), "hunter22");
        assert_eq!(settings.asset_symbol.as_str(), "ETH");
        assert_eq!(settings.currency_code.as_str(), "EUR");
        assert_eq!(settings.refresh_interval_secs, 30);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let settings = FormSubmission::parse(b"ssid=Cafe")
            .unwrap()
            .into_settings()
            .unwrap();

        assert!(settings.credentials.unwrap().is_open());
        assert_eq!(settings.asset_symbol.as_str(), "BTC");
        assert_eq!(settings.currency_code.as_str(), "USD");
        assert_eq!(settings.refresh_interval_secs, 60);
    }

    #[test]
    fn test_ssid_required() {
        for body in [&b"crypto=BTC"[..], b"ssid=&crypto=BTC"] {
            let result = FormSubmission::parse(body).unwrap().into_settings();
            assert_eq!(result, Err(FormError::MissingSsid));
        }
    }

    #[test]
    fn test_interval_bounds() {
        for (raw, ok) in [
            ("29", false),
            ("30", true),
            ("3600", true),
            ("3601", false),
            ("0", false),
            ("-5", false),
            ("1e2", false),
            ("", false),
        ] {
            let form = FormSubmission {
                interval: Some(raw.to_string()),
                ..Default::default()
            };
            assert_eq!(form.refresh_interval_secs().is_ok(), ok, "interval {raw:?}");
        }
    }

    #[test]
    fn test_unsupported_choices_rejected() {
        let result = FormSubmission::parse(b"ssid=a&crypto=SHIB")
            .unwrap()
            .into_settings();
        assert_eq!(result, Err(FormError::UnsupportedAsset("SHIB".into())));

        let result = FormSubmission::parse(b"ssid=a&currency=usd")
            .unwrap()
            .into_settings();
        assert_eq!(result, Err(FormError::UnsupportedCurrency("usd".into())));
    }

    #[test]
    fn test_oversized_credentials_rejected() {
        let form = FormSubmission {
            ssid: Some("x".repeat(SSID_CAPACITY + 1)),
            ..Default::default()
        };
        assert_eq!(
            form.into_settings(),
            Err(FormError::TooLong {
                field: "ssid",
                capacity: SSID_CAPACITY
            })
        );
    }
}
