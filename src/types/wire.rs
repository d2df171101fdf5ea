//! Typed payloads for the external rate provider's documented responses.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::types::common::CurrencyCode;
use crate::types::serde_helpers;

/// Real-time response: `{base, date, rates: {currencyCode: number}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RealTimeRates {
    /// The base currency the rates are quoted against
    pub base: CurrencyCode,
    /// The calendar day the quotes apply to
    #[serde(with = "serde_helpers::iso_date")]
    pub date: Date,
    /// One quote per target currency
    #[serde(with = "serde_helpers::currency_rate_map")]
    pub rates: BTreeMap<CurrencyCode, Decimal>,
}

/// Historical response: `{base, target, rates: {dateString: number}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalRates {
    /// Base currency of the pair
    pub base: CurrencyCode,
    /// Target currency of the pair
    pub target: CurrencyCode,
    /// One quote per calendar day in the requested range
    #[serde(with = "serde_helpers::date_rate_map")]
    pub rates: BTreeMap<Date, Decimal>,
}
