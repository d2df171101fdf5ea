//! Core domain types: currency codes, rate records, usage windows.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::{Date, OffsetDateTime};

use crate::error::FxError;
use crate::types::serde_helpers;

/// A validated three-letter currency code (ISO 4217 style).
///
/// Parsing normalizes to upper case and rejects anything that is not exactly
/// three ASCII letters, so a `CurrencyCode` in hand is always well-formed.
///
/// # Example
///
/// ```rust
/// use fx_rates::types::CurrencyCode;
///
/// let usd: CurrencyCode = "usd".parse().unwrap();
/// assert_eq!(usd.as_str(), "USD");
/// assert!("US".parse::<CurrencyCode>().is_err());
/// assert!("U5D".parse::<CurrencyCode>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// The code as an uppercase string slice.
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII, so this cannot fail.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for CurrencyCode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(FxError::Validation {
                field: "currency",
                message: format!("{s:?} is not a three-letter currency code"),
            });
        }
        let mut code = [0u8; 3];
        for (dst, src) in code.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(CurrencyCode(code))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Which kind of rate a record holds.
///
/// Real-time records are overwritten on each successful fetch for the same
/// day; historical records are write-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateFlavor {
    /// Opportunistically refreshed, latest fetch wins
    RealTime,
    /// Fixed to a past calendar day, immutable once recorded
    Historical,
}

impl RateFlavor {
    /// Flag form used in the stored record.
    pub fn is_real_time(self) -> bool {
        matches!(self, RateFlavor::RealTime)
    }

    /// The flavor for a stored `is_real_time` flag.
    pub fn from_flag(is_real_time: bool) -> Self {
        if is_real_time {
            RateFlavor::RealTime
        } else {
            RateFlavor::Historical
        }
    }
}

/// One stored exchange rate for a currency pair on a calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRateRecord {
    /// Base currency of the pair
    pub base: CurrencyCode,
    /// Target currency of the pair
    pub target: CurrencyCode,
    /// Units of `target` per one unit of `base`
    pub rate: Decimal,
    /// Calendar day (UTC) the rate applies to
    #[serde(with = "serde_helpers::iso_date")]
    pub date: Date,
    /// Real-time records are overwritten in place; historical ones never are
    pub is_real_time: bool,
    /// When this value was written; refreshed on every real-time overwrite
    #[serde(with = "serde_helpers::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Set when a real-time record is overwritten
    #[serde(with = "serde_helpers::rfc3339_option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl ExchangeRateRecord {
    /// The flavor this record belongs to.
    pub fn flavor(&self) -> RateFlavor {
        RateFlavor::from_flag(self.is_real_time)
    }
}

/// Per-client request count within one hour-aligned window.
///
/// Exactly one row exists per `(api_key, window_start)`; the count only ever
/// increases within a window. Expiry of old windows is an external concern.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    /// The client the count belongs to
    pub api_key: String,
    /// Hour-aligned UTC start of the window
    pub window_start: OffsetDateTime,
    /// Requests recorded in this window so far
    pub request_count: u32,
    /// When the most recent request was recorded
    pub last_request_at: OffsetDateTime,
}

/// A currency pair covered by the historical backfill.
///
/// External configuration, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPairConfig {
    /// Base currency of the pair
    pub base: CurrencyCode,
    /// Target currency of the pair
    pub target: CurrencyCode,
    /// Inactive pairs are skipped by the backfill
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// When the pair was last backfilled, if known
    #[serde(default, with = "serde_helpers::rfc3339_option")]
    pub last_updated: Option<OffsetDateTime>,
}

fn default_active() -> bool {
    true
}

impl CurrencyPairConfig {
    /// An active pair with no backfill history.
    pub fn new(base: CurrencyCode, target: CurrencyCode) -> Self {
        Self {
            base,
            target,
            is_active: true,
            last_updated: None,
        }
    }
}

/// The result of a successful conversion.
///
/// Amounts are full-precision decimals; rounding and display formatting are
/// boundary concerns.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// Currency converted from
    pub from: CurrencyCode,
    /// Currency converted to
    pub to: CurrencyCode,
    /// The amount the caller asked to convert
    pub original_amount: Decimal,
    /// `original_amount * rate`, unrounded
    pub converted_amount: Decimal,
    /// The rate that was applied
    pub rate: Decimal,
    /// Calendar day the rate applies to
    #[serde(with = "serde_helpers::iso_date")]
    pub date: Date,
    /// Whether the applied rate was a real-time or historical one
    pub is_real_time: bool,
}

impl Conversion {
    /// Apply a stored rate to an amount.
    pub fn from_record(record: &ExchangeRateRecord, amount: Decimal) -> Self {
        Self {
            from: record.base,
            to: record.target,
            original_amount: amount,
            converted_amount: amount * record.rate,
            rate: record.rate,
            date: record.date,
            is_real_time: record.is_real_time,
        }
    }
}

/// A per-day rate series for one currency pair.
#[derive(Debug, Clone, Serialize)]
pub struct RateSeries {
    /// Base currency of the pair
    pub base: CurrencyCode,
    /// Target currency of the pair
    pub target: CurrencyCode,
    /// One rate per calendar day, ascending
    #[serde(with = "serde_helpers::date_rate_map")]
    pub rates: BTreeMap<Date, Decimal>,
}
