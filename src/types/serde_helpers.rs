//! Custom serde helpers for the provider's wire formats.
//!
//! The upstream provider keys historical rates by `yyyy-mm-dd` strings and
//! sends rates as bare JSON numbers. These modules parse both losslessly
//! (numbers go through `serde_json::Number`, so no float round-trip) and are
//! reusable with `#[serde(with = "...")]`.

use std::collections::BTreeMap;
use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::types::common::CurrencyCode;

/// Serialize/deserialize a `time::Date` as a `yyyy-mm-dd` string.
pub mod iso_date {
    use super::*;

    /// Serialize a date as `yyyy-mm-dd`.
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    /// Deserialize a `yyyy-mm-dd` string into a date.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_iso_date(&s).map_err(de::Error::custom)
    }
}

/// Serialize/deserialize an `OffsetDateTime` as an RFC 3339 string.
pub mod rfc3339 {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    /// Serialize a timestamp as RFC 3339.
    pub fn serialize<S: Serializer>(
        timestamp: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let formatted = timestamp.format(&Rfc3339).map_err(ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    /// Deserialize an RFC 3339 string into a timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339).map_err(de::Error::custom)
    }
}

/// `rfc3339` for optional timestamps.
pub mod rfc3339_option {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    /// Serialize an optional timestamp as RFC 3339 or null.
    pub fn serialize<S: Serializer>(
        timestamp: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match timestamp {
            Some(t) => {
                let formatted = t.format(&Rfc3339).map_err(ser::Error::custom)?;
                serializer.serialize_some(&formatted)
            }
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an RFC 3339 string or null.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| OffsetDateTime::parse(&s, &Rfc3339).map_err(de::Error::custom))
            .transpose()
    }
}

/// A rate map keyed by calendar day, as in the historical payload:
/// `{"2024-06-01": 0.80, "2024-06-02": 0.81}`.
pub mod date_rate_map {
    use super::*;

    /// Serialize as a map of `yyyy-mm-dd` keys to decimal values.
    pub fn serialize<S: Serializer>(
        rates: &BTreeMap<Date, Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut formatted = BTreeMap::new();
        for (date, rate) in rates {
            let key = date
                .format(format_description!("[year]-[month]-[day]"))
                .map_err(ser::Error::custom)?;
            formatted.insert(key, *rate);
        }
        formatted.serialize(serializer)
    }

    /// Deserialize a map of date strings to numeric (or string) rates.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Date, Decimal>, D::Error> {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                let date = parse_iso_date(&key).map_err(de::Error::custom)?;
                Ok((date, decimal_from_value(value)?))
            })
            .collect()
    }
}

/// A rate map keyed by currency code, as in the real-time payload:
/// `{"GBP": 0.80, "EUR": 0.92}`.
pub mod currency_rate_map {
    use super::*;

    /// Serialize as a map of currency codes to decimal values.
    pub fn serialize<S: Serializer>(
        rates: &BTreeMap<CurrencyCode, Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        rates.serialize(serializer)
    }

    /// Deserialize a map of currency codes to numeric (or string) rates.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<CurrencyCode, Decimal>, D::Error> {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                let code: CurrencyCode = key.parse().map_err(de::Error::custom)?;
                Ok((code, decimal_from_value(value)?))
            })
            .collect()
    }
}

fn parse_iso_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
}

fn decimal_from_value<E: de::Error>(value: serde_json::Value) -> Result<Decimal, E> {
    match value {
        // Number's Display prints the exact JSON literal, so parsing it into
        // a Decimal loses nothing.
        serde_json::Value::Number(n) => parse_decimal(n, E::custom),
        serde_json::Value::String(s) => parse_decimal(s, E::custom),
        other => Err(E::custom(format!("expected a numeric rate, got {other}"))),
    }
}

fn parse_decimal<T: Display, E>(raw: T, err: impl Fn(String) -> E) -> Result<Decimal, E> {
    let literal = raw.to_string();
    literal
        .parse()
        .map_err(|e| err(format!("invalid decimal {literal:?}: {e}")))
}
