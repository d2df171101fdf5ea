//! In-memory store implementations.
//!
//! Atomicity holds within one process: every keyed operation runs under a
//! single lock, so same-key upserts and increments serialize. Suitable for
//! tests and single-instance deployments; multi-instance deployments need a
//! database-backed implementation of the same contracts.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use crate::error::FxError;
use crate::store::{RateStore, UsageStore};
use crate::types::common::{CurrencyCode, ExchangeRateRecord, RateFlavor, UsageWindow};

type RecordKey = (CurrencyCode, CurrencyCode, Date, RateFlavor);

/// A stored record plus a monotonic sequence number.
///
/// `created_at` has wall-clock resolution, so two writes in the same instant
/// would otherwise tie; the sequence number makes "latest created" total.
struct StoredRecord {
    record: ExchangeRateRecord,
    seq: u64,
}

struct RateStoreInner {
    records: HashMap<RecordKey, StoredRecord>,
    next_seq: u64,
}

/// In-memory [`RateStore`].
#[derive(Default)]
pub struct InMemoryRateStore {
    inner: Mutex<RateStoreInner>,
}

impl Default for RateStoreInner {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl InMemoryRateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, for inspection in tests.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }
}

impl RateStore for InMemoryRateStore {
    async fn latest(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
    ) -> Result<Option<ExchangeRateRecord>, FxError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .values()
            .filter(|stored| stored.record.base == base && stored.record.target == target)
            .max_by_key(|stored| (stored.record.created_at, stored.seq))
            .map(|stored| stored.record.clone()))
    }

    async fn for_date(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
    ) -> Result<Option<ExchangeRateRecord>, FxError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .values()
            .filter(|stored| {
                stored.record.base == base
                    && stored.record.target == target
                    && stored.record.date == date
            })
            .max_by_key(|stored| (stored.record.created_at, stored.seq))
            .map(|stored| stored.record.clone()))
    }

    async fn range(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        start: Date,
        end: Date,
    ) -> Result<Vec<ExchangeRateRecord>, FxError> {
        let inner = self.inner.lock().await;
        let mut per_day: BTreeMap<Date, &StoredRecord> = BTreeMap::new();
        for stored in inner.records.values() {
            let record = &stored.record;
            if record.base != base
                || record.target != target
                || record.date < start
                || record.date > end
            {
                continue;
            }
            let candidate = (record.created_at, stored.seq);
            match per_day.get(&record.date) {
                Some(current) if (current.record.created_at, current.seq) >= candidate => {}
                _ => {
                    per_day.insert(record.date, stored);
                }
            }
        }
        Ok(per_day
            .into_values()
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn upsert_real_time(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
        rate: Decimal,
    ) -> Result<ExchangeRateRecord, FxError> {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let now = OffsetDateTime::now_utc();
        let key = (base, target, date, RateFlavor::RealTime);
        let stored = inner
            .records
            .entry(key)
            .and_modify(|existing| {
                // Overwrite semantics: rate and created_at move forward,
                // updated_at marks the overwrite.
                existing.record.rate = rate;
                existing.record.created_at = now;
                existing.record.updated_at = Some(now);
                existing.seq = seq;
            })
            .or_insert_with(|| StoredRecord {
                record: ExchangeRateRecord {
                    base,
                    target,
                    rate,
                    date,
                    is_real_time: true,
                    created_at: now,
                    updated_at: None,
                },
                seq,
            });
        Ok(stored.record.clone())
    }

    async fn insert_historical_if_absent(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        date: Date,
        rate: Decimal,
    ) -> Result<bool, FxError> {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        let key = (base, target, date, RateFlavor::Historical);
        if inner.records.contains_key(&key) {
            return Ok(false);
        }
        inner.next_seq += 1;
        inner.records.insert(
            key,
            StoredRecord {
                record: ExchangeRateRecord {
                    base,
                    target,
                    rate,
                    date,
                    is_real_time: false,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: None,
                },
                seq,
            },
        );
        Ok(true)
    }
}

/// In-memory [`UsageStore`].
#[derive(Default)]
pub struct InMemoryUsageStore {
    windows: Mutex<HashMap<(String, OffsetDateTime), UsageWindow>>,
}

impl InMemoryUsageStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for InMemoryUsageStore {
    async fn find(
        &self,
        api_key: &str,
        window_start: OffsetDateTime,
    ) -> Result<Option<UsageWindow>, FxError> {
        let windows = self.windows.lock().await;
        Ok(windows.get(&(api_key.to_string(), window_start)).cloned())
    }

    async fn increment_or_insert(
        &self,
        api_key: &str,
        window_start: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Result<UsageWindow, FxError> {
        let mut windows = self.windows.lock().await;
        let window = windows
            .entry((api_key.to_string(), window_start))
            .and_modify(|w| {
                w.request_count += 1;
                w.last_request_at = now;
            })
            .or_insert_with(|| UsageWindow {
                api_key: api_key.to_string(),
                window_start,
                request_count: 1,
                last_request_at: now,
            });
        Ok(window.clone())
    }
}
