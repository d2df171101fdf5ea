//! Storage contracts for rate records and usage windows.
//!
//! The persistence engine is an external collaborator; these traits capture
//! the exact contract the core needs from it. That enables:
//! - In-memory implementations for tests and single-process deployments
//! - Database-backed implementations without touching the core
//!
//! ## Atomicity contract
//!
//! Multiple service instances may run against the same store, so same-key
//! atomicity must be enforced at the storage layer (unique indexes plus
//! atomic upsert/increment primitives), never by in-process locking alone.
//! Storage failures surface as [`FxError::Storage`] and are not retried by
//! the core.

mod memory;

pub use memory::{InMemoryRateStore, InMemoryUsageStore};

use std::future::Future;

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

use crate::error::FxError;
use crate::types::common::{CurrencyCode, ExchangeRateRecord, UsageWindow};

/// Persistent store for exchange-rate records.
///
/// Uniqueness is on `(base, target, date)` for historical records and
/// `(base, target, date, flavor)` for real-time ones. Where a race has left
/// duplicates for a day, reads resolve to the record with the latest
/// `created_at`.
pub trait RateStore: Send + Sync {
    /// The most recently created record for the pair, either flavor.
    fn latest(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
    ) -> impl Future<Output = Result<Option<ExchangeRateRecord>, FxError>> + Send;

    /// The record for an exact calendar day, latest `created_at` winning.
    fn for_date(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
    ) -> impl Future<Output = Result<Option<ExchangeRateRecord>, FxError>> + Send;

    /// One record per calendar day in `[start, end]`, ascending by date,
    /// latest `created_at` winning per day. Days with no record are absent.
    fn range(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        start: Date,
        end: Date,
    ) -> impl Future<Output = Result<Vec<ExchangeRateRecord>, FxError>> + Send;

    /// Overwrite the same-day real-time record's rate and `created_at`, or
    /// insert a new one. Atomic per key; the last completed write wins.
    fn upsert_real_time(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
        rate: Decimal,
    ) -> impl Future<Output = Result<ExchangeRateRecord, FxError>> + Send;

    /// Insert a historical record unless one already exists for that day.
    ///
    /// Returns whether a record was inserted. Idempotent under duplicate
    /// backfill attempts; an existing record is never overwritten.
    fn insert_historical_if_absent(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
        rate: Decimal,
    ) -> impl Future<Output = Result<bool, FxError>> + Send;
}

/// Persistent store for per-client request-count windows.
///
/// Exactly one row per `(api_key, window_start)`. Concurrent increments for
/// the same key and window must not lose counts; implementations need an
/// atomic increment-or-insert primitive (compare-and-swap or single-writer
/// serialization per key).
pub trait UsageStore: Send + Sync {
    /// The usage row for a client and window, if one exists.
    fn find(
        &self,
        api_key: &str,
        window_start: OffsetDateTime,
    ) -> impl Future<Output = Result<Option<UsageWindow>, FxError>> + Send;

    /// Atomically increment the count for `(api_key, window_start)`, creating
    /// the row with a count of one if absent. Returns the row after the
    /// increment.
    fn increment_or_insert(
        &self,
        api_key: &str,
        window_start: OffsetDateTime,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<UsageWindow, FxError>> + Send;
}
