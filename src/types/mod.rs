//! Domain types shared across the library.

pub mod common;
pub mod serde_helpers;
pub mod wire;

pub use common::{
    Conversion, CurrencyCode, CurrencyPairConfig, ExchangeRateRecord, RateFlavor, RateSeries,
    UsageWindow,
};
pub use wire::{HistoricalRates, RealTimeRates};
