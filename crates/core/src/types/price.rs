//! Prices, currencies and loose price normalization.
//!
//! Scraped marketplace data reports prices as `{value, currency}` objects,
//! bare numbers, or display strings like `"₹1,299.00"`. [`RawPrice`] accepts
//! all of them and [`RawPrice::normalize`] folds them into a [`Price`].

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Serialized as `{"value": 1299.0, "currency": "INR"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (rupees, not paise).
    #[serde(rename = "value", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(rename = "currency")]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount, used when a source reports no usable price.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Whether the amount is zero (no known price).
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes seen on supported marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
}

/// Error returned for an unsupported currency code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl CurrencyCode {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::JPY => "JPY",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::JPY => "¥",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "JPY" => Ok(Self::JPY),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(UnknownCurrency(s.to_owned())),
        }
    }
}

/// A price as reported by an untrusted source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
    Tagged {
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        currency: Option<String>,
    },
    Other(serde_json::Value),
}

impl RawPrice {
    /// Fold the raw price into a [`Price`].
    ///
    /// Unparseable, non-finite and negative amounts become zero. The currency
    /// comes from a tagged object when it names a supported code, otherwise
    /// `default_currency` is used.
    #[must_use]
    pub fn normalize(&self, default_currency: CurrencyCode) -> Price {
        match self {
            Self::Number(n) => Price::new(amount_from_f64(*n), default_currency),
            Self::Text(s) => Price::new(parse_amount(s), default_currency),
            Self::Tagged { value, currency } => {
                let amount = match value {
                    Some(serde_json::Value::Number(n)) => {
                        n.as_f64().map_or(Decimal::ZERO, amount_from_f64)
                    }
                    Some(serde_json::Value::String(s)) => parse_amount(s),
                    _ => Decimal::ZERO,
                };
                let currency_code = currency
                    .as_deref()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(default_currency);
                Price::new(amount, currency_code)
            }
            Self::Other(_) => Price::zero(default_currency),
        }
    }
}

fn amount_from_f64(n: f64) -> Decimal {
    if !n.is_finite() || n < 0.0 {
        return Decimal::ZERO;
    }
    Decimal::try_from(n).map_or(Decimal::ZERO, |d| d.round_dp(2))
}

/// Parse the leading amount out of a display string such as `"Rs. 1,299.50"`.
fn parse_amount(s: &str) -> Decimal {
    let compact: String = s
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let Some(start) = compact.find(|c: char| c.is_ascii_digit()) else {
        return Decimal::ZERO;
    };

    let mut seen_dot = false;
    let digits: String = compact
        .get(start..)
        .unwrap_or_default()
        .chars()
        .take_while(|c| {
            if *c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit()
            }
        })
        .collect();

    Decimal::from_str(digits.trim_end_matches('.'))
        .map_or(Decimal::ZERO, |d| d.round_dp(2))
}
