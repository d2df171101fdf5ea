//! Access to the external exchange-rate provider.
//!
//! [`RateProvider`] abstracts the two documented upstream operations so the
//! engine can be tested against mocks; [`HttpRateProvider`] is the real
//! implementation with admission control, bounded retries, and failure
//! classification.

mod client;
mod fault;

pub use client::{HttpRateProvider, HttpRateProviderBuilder};
pub use fault::{FailFirst, FaultInjector, NoFaults};

use std::future::Future;

use secrecy::SecretString;
use time::Date;

use crate::error::FxError;
use crate::types::common::CurrencyCode;
use crate::types::wire::{HistoricalRates, RealTimeRates};

/// Upstream endpoint paths.
pub mod endpoints {
    /// Latest quotes for a base currency: `GET real-time?base=X`.
    pub const REAL_TIME: &str = "/real-time";
    /// Day-by-day quotes for one pair:
    /// `GET historical?base=X&target=Y&start_date=D&end_date=D`.
    pub const HISTORICAL: &str = "/historical";
}

/// Name of the client-identifying key header.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// The external rate provider's operations.
///
/// Both calls check rate-limit admission for `api_key` before any network
/// traffic and record usage exactly once on terminal success. The returned
/// futures are drop-cancellable: racing them against a cancellation signal
/// with `tokio::select!` aborts outstanding retries promptly.
pub trait RateProvider: Send + Sync {
    /// Fetch the latest quotes for every target of `base`.
    fn real_time_rates(
        &self,
        base: CurrencyCode,
        api_key: &SecretString,
    ) -> impl Future<Output = Result<RealTimeRates, FxError>> + Send;

    /// Fetch one quote per calendar day in `[start, end]` for a pair.
    ///
    /// An upstream 404 surfaces as [`FxError::UpstreamNotFound`]; a payload
    /// with an empty rate map is a valid "no data" outcome, not a failure.
    fn historical_rates(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        start: Date,
        end: Date,
        api_key: &SecretString,
    ) -> impl Future<Output = Result<HistoricalRates, FxError>> + Send;
}
