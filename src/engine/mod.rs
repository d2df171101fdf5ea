//! Conversion orchestration: cache lookup, fetch-and-refresh fallback,
//! arithmetic.

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use time::{Date, OffsetDateTime};

use crate::error::FxError;
use crate::provider::RateProvider;
use crate::store::RateStore;
use crate::types::common::{Conversion, CurrencyCode, CurrencyPairConfig, RateSeries};

/// Days of history fetched by a backfill when not configured otherwise.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// What the engine refreshes and backfills.
pub struct EngineConfig {
    /// Credential passed to the provider; also the rate-limiter client key
    pub api_key: SecretString,
    /// Base currencies covered by the periodic real-time refresh
    pub base_currencies: Vec<CurrencyCode>,
    /// Pairs covered by the historical backfill
    pub pairs: Vec<CurrencyPairConfig>,
}

impl EngineConfig {
    /// A config with no refresh targets; add them with the `with_` methods.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_currencies: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// Base currencies for the periodic real-time refresh.
    pub fn with_base_currencies(mut self, bases: impl IntoIterator<Item = CurrencyCode>) -> Self {
        self.base_currencies = bases.into_iter().collect();
        self
    }

    /// Currency pairs for the historical backfill.
    pub fn with_pairs(mut self, pairs: impl IntoIterator<Item = CurrencyPairConfig>) -> Self {
        self.pairs = pairs.into_iter().collect();
        self
    }
}

/// Outcome counts for one real-time refresh sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Base currencies refreshed successfully
    pub refreshed: usize,
    /// Base currencies whose refresh failed (logged, not propagated)
    pub failed: usize,
    /// Rate records upserted across all refreshed bases
    pub rates_stored: usize,
}

/// Outcome counts for one historical backfill sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Active pairs processed successfully
    pub pairs_processed: usize,
    /// Pairs whose fetch or store failed (logged, not propagated)
    pub pairs_failed: usize,
    /// New historical records inserted; existing days are left untouched
    pub inserted: usize,
}

/// Ties the rate store and the external fetcher together.
///
/// Absent-rate outcomes are `Ok(None)`, distinct from errors: a conversion
/// for which no rate could be found is a defined result, not a failure.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fx_rates::engine::{ConversionEngine, EngineConfig};
/// use fx_rates::limiter::HourlyRateLimiter;
/// use fx_rates::provider::HttpRateProvider;
/// use fx_rates::store::{InMemoryRateStore, InMemoryUsageStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), fx_rates::FxError> {
/// let limiter = HourlyRateLimiter::new(Arc::new(InMemoryUsageStore::new()), 1000);
/// let provider = HttpRateProvider::builder("https://rates.example.com", limiter).build();
/// let engine = ConversionEngine::new(
///     Arc::new(InMemoryRateStore::new()),
///     Arc::new(provider),
///     EngineConfig::new("client-key".into()),
/// );
///
/// match engine.convert("USD".parse()?, "GBP".parse()?, "100".parse().unwrap()).await? {
///     Some(conversion) => println!("= {}", conversion.converted_amount),
///     None => println!("no rate available"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConversionEngine<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    config: EngineConfig,
}

impl<S: RateStore, P: RateProvider> ConversionEngine<S, P> {
    /// Create an engine over a rate store and a provider.
    pub fn new(store: Arc<S>, provider: Arc<P>, config: EngineConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Convert `amount` using the freshest known rate for the pair.
    ///
    /// On a cache miss this triggers one synchronous real-time refresh of
    /// `from` and retries the lookup exactly once; a refresh failure is
    /// logged, never propagated. The converted amount is exact decimal
    /// arithmetic with no rounding.
    pub async fn convert(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: Decimal,
    ) -> Result<Option<Conversion>, FxError> {
        if let Some(record) = self.store.latest(from, to).await? {
            return Ok(Some(Conversion::from_record(&record, amount)));
        }

        if let Err(err) = self.refresh_base(from).await {
            tracing::warn!(base = %from, error = %err, "refresh on cache miss failed");
        }

        Ok(self
            .store
            .latest(from, to)
            .await?
            .map(|record| Conversion::from_record(&record, amount)))
    }

    /// Convert `amount` at the rate recorded for an exact past day.
    ///
    /// No refresh fallback: historical data is populated by the backfill, so
    /// an absent day is simply `None`.
    pub async fn convert_historical(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: Decimal,
        date: Date,
    ) -> Result<Option<Conversion>, FxError> {
        Ok(self
            .store
            .for_date(from, to, date)
            .await?
            .map(|record| Conversion::from_record(&record, amount)))
    }

    /// The per-day rate series for a pair over `[start, end]`.
    ///
    /// The caller has already validated `start <= end <= today`. Days with no
    /// stored record are absent from the series.
    pub async fn historical_series(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        start: Date,
        end: Date,
    ) -> Result<RateSeries, FxError> {
        let records = self.store.range(from, to, start, end).await?;
        Ok(RateSeries {
            base: from,
            target: to,
            rates: records.into_iter().map(|r| (r.date, r.rate)).collect(),
        })
    }

    /// Fetch and upsert the latest rates for every configured base currency.
    ///
    /// A failure for one base is logged and does not prevent processing the
    /// rest.
    pub async fn refresh_real_time(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        for &base in &self.config.base_currencies {
            match self.refresh_base(base).await {
                Ok(stored) => {
                    summary.refreshed += 1;
                    summary.rates_stored += stored;
                }
                Err(err) => {
                    tracing::error!(%base, error = %err, "failed to refresh real-time rates");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Backfill historical rates for every active configured pair over the
    /// trailing `lookback_days`.
    ///
    /// Per-day inserts are idempotent, so re-running a backfill never
    /// overwrites existing history. Pair failures are isolated.
    pub async fn backfill_historical(&self, lookback_days: u32) -> BackfillSummary {
        let end = OffsetDateTime::now_utc().date();
        let start = end - time::Duration::days(i64::from(lookback_days));

        let mut summary = BackfillSummary::default();
        for pair in self.config.pairs.iter().filter(|p| p.is_active) {
            match self.backfill_pair(pair, start, end).await {
                Ok(inserted) => {
                    summary.pairs_processed += 1;
                    summary.inserted += inserted;
                }
                Err(err) => {
                    tracing::error!(
                        base = %pair.base,
                        target = %pair.target,
                        error = %err,
                        "failed to backfill historical rates"
                    );
                    summary.pairs_failed += 1;
                }
            }
        }
        summary
    }

    /// Fetch real-time rates for one base and upsert every returned target.
    async fn refresh_base(&self, base: CurrencyCode) -> Result<usize, FxError> {
        let payload = self
            .provider
            .real_time_rates(base, &self.config.api_key)
            .await?;
        let mut stored = 0;
        for (&target, &rate) in &payload.rates {
            self.store
                .upsert_real_time(payload.base, target, payload.date, rate)
                .await?;
            stored += 1;
        }
        Ok(stored)
    }

    async fn backfill_pair(
        &self,
        pair: &CurrencyPairConfig,
        start: Date,
        end: Date,
    ) -> Result<usize, FxError> {
        let payload = self
            .provider
            .historical_rates(pair.base, pair.target, start, end, &self.config.api_key)
            .await?;
        let mut inserted = 0;
        for (&date, &rate) in &payload.rates {
            if self
                .store
                .insert_historical_if_absent(payload.base, payload.target, date, rate)
                .await?
            {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::InMemoryRateStore;
    use crate::types::wire::{HistoricalRates, RealTimeRates};
    use time::macros::date;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// Deterministic provider for engine tests: serves a fixed target map
    /// for real-time, a flat per-day rate for historical, and fails for
    /// configured bases/pairs.
    struct ScriptedProvider {
        real_time: BTreeMap<CurrencyCode, Decimal>,
        historical_rate: Decimal,
        fail_bases: HashSet<CurrencyCode>,
        fail_pairs: HashSet<(CurrencyCode, CurrencyCode)>,
        real_time_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(real_time: BTreeMap<CurrencyCode, Decimal>) -> Self {
            Self {
                real_time,
                historical_rate: dec("0.80"),
                fail_bases: HashSet::new(),
                fail_pairs: HashSet::new(),
                real_time_calls: AtomicUsize::new(0),
            }
        }

        fn real_time_calls(&self) -> usize {
            self.real_time_calls.load(Ordering::SeqCst)
        }
    }

    impl RateProvider for ScriptedProvider {
        async fn real_time_rates(
            &self,
            base: CurrencyCode,
            _api_key: &SecretString,
        ) -> Result<RealTimeRates, FxError> {
            self.real_time_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_bases.contains(&base) {
                return Err(FxError::UpstreamTransport("scripted failure".to_string()));
            }
            Ok(RealTimeRates {
                base,
                date: OffsetDateTime::now_utc().date(),
                rates: self.real_time.clone(),
            })
        }

        async fn historical_rates(
            &self,
            base: CurrencyCode,
            target: CurrencyCode,
            start: Date,
            end: Date,
            _api_key: &SecretString,
        ) -> Result<HistoricalRates, FxError> {
            if self.fail_pairs.contains(&(base, target)) {
                return Err(FxError::UpstreamTransport("scripted failure".to_string()));
            }
            let mut rates = BTreeMap::new();
            let mut day = start;
            while day <= end {
                rates.insert(day, self.historical_rate);
                day = day.next_day().unwrap();
            }
            Ok(HistoricalRates {
                base,
                target,
                rates,
            })
        }
    }

    fn engine_with(
        provider: ScriptedProvider,
        config: EngineConfig,
    ) -> (
        Arc<InMemoryRateStore>,
        Arc<ScriptedProvider>,
        ConversionEngine<InMemoryRateStore, ScriptedProvider>,
    ) {
        let store = Arc::new(InMemoryRateStore::new());
        let provider = Arc::new(provider);
        let engine = ConversionEngine::new(store.clone(), provider.clone(), config);
        (store, provider, engine)
    }

    fn test_config() -> EngineConfig {
        EngineConfig::new("test-key".into())
    }

    #[tokio::test]
    async fn test_convert_uses_cached_rate_exactly() {
        let (store, provider, engine) =
            engine_with(ScriptedProvider::new(BTreeMap::new()), test_config());
        store
            .upsert_real_time(code("USD"), code("GBP"), date!(2024 - 06 - 01), dec("0.80"))
            .await
            .unwrap();

        let conversion = engine
            .convert(code("USD"), code("GBP"), dec("100"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(conversion.converted_amount, dec("80.00"));
        assert_eq!(conversion.original_amount, dec("100"));
        assert_eq!(conversion.rate, dec("0.80"));
        assert_eq!(conversion.date, date!(2024 - 06 - 01));
        assert!(conversion.is_real_time);
        // Cache hit, so no provider traffic.
        assert_eq!(provider.real_time_calls(), 0);
    }

    #[tokio::test]
    async fn test_convert_miss_refreshes_once_then_converts() {
        let rates = BTreeMap::from([(code("GBP"), dec("0.80")), (code("EUR"), dec("0.92"))]);
        let (store, provider, engine) = engine_with(ScriptedProvider::new(rates), test_config());

        let conversion = engine
            .convert(code("USD"), code("GBP"), dec("50"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(provider.real_time_calls(), 1);
        assert_eq!(conversion.converted_amount, dec("40.00"));
        // The refresh stored every returned target, not just the requested one.
        assert!(
            store
                .latest(code("USD"), code("EUR"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_convert_miss_with_empty_refresh_is_not_found() {
        let (_store, provider, engine) =
            engine_with(ScriptedProvider::new(BTreeMap::new()), test_config());

        let outcome = engine
            .convert(code("USD"), code("GBP"), dec("100"))
            .await
            .unwrap();

        assert!(outcome.is_none());
        // Exactly one refresh-and-retry cycle, not a loop.
        assert_eq!(provider.real_time_calls(), 1);
    }

    #[tokio::test]
    async fn test_convert_miss_with_failing_refresh_is_not_found() {
        let mut provider = ScriptedProvider::new(BTreeMap::new());
        provider.fail_bases.insert(code("USD"));
        let (_store, provider, engine) = engine_with(provider, test_config());

        let outcome = engine
            .convert(code("USD"), code("GBP"), dec("100"))
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(provider.real_time_calls(), 1);
    }

    #[tokio::test]
    async fn test_convert_historical_has_no_refresh_fallback() {
        let (store, provider, engine) =
            engine_with(ScriptedProvider::new(BTreeMap::new()), test_config());
        store
            .insert_historical_if_absent(code("USD"), code("GBP"), date!(2024 - 05 - 30), dec("0.79"))
            .await
            .unwrap();

        let hit = engine
            .convert_historical(code("USD"), code("GBP"), dec("200"), date!(2024 - 05 - 30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.converted_amount, dec("158.00"));
        assert!(!hit.is_real_time);

        let miss = engine
            .convert_historical(code("USD"), code("GBP"), dec("200"), date!(2024 - 05 - 29))
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(provider.real_time_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_isolates_per_base_failures() {
        let rates = BTreeMap::from([(code("GBP"), dec("0.80"))]);
        let mut provider = ScriptedProvider::new(rates);
        provider.fail_bases.insert(code("EUR"));
        let config = test_config()
            .with_base_currencies([code("USD"), code("EUR"), code("GBP")]);
        let (store, _provider, engine) = engine_with(provider, config);

        let summary = engine.refresh_real_time().await;

        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rates_stored, 2);
        assert!(
            store
                .latest(code("USD"), code("GBP"))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .latest(code("EUR"), code("GBP"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_backfill_isolates_middle_pair_failure() {
        let mut provider = ScriptedProvider::new(BTreeMap::new());
        provider.fail_pairs.insert((code("USD"), code("EUR")));
        let config = test_config().with_pairs([
            CurrencyPairConfig::new(code("USD"), code("GBP")),
            CurrencyPairConfig::new(code("USD"), code("EUR")),
            CurrencyPairConfig::new(code("USD"), code("JPY")),
        ]);
        let (store, _provider, engine) = engine_with(provider, config);

        let summary = engine.backfill_historical(3).await;

        assert_eq!(summary.pairs_processed, 2);
        assert_eq!(summary.pairs_failed, 1);
        // 4 days per pair: today minus 3 through today, inclusive.
        assert_eq!(summary.inserted, 8);

        let today = OffsetDateTime::now_utc().date();
        assert!(
            store
                .for_date(code("USD"), code("GBP"), today)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .for_date(code("USD"), code("EUR"), today)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .for_date(code("USD"), code("JPY"), today)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_backfill_skips_inactive_pairs_and_is_idempotent() {
        let mut inactive = CurrencyPairConfig::new(code("USD"), code("EUR"));
        inactive.is_active = false;
        let config = test_config().with_pairs([
            CurrencyPairConfig::new(code("USD"), code("GBP")),
            inactive,
        ]);
        let (_store, _provider, engine) =
            engine_with(ScriptedProvider::new(BTreeMap::new()), config);

        let first = engine.backfill_historical(2).await;
        assert_eq!(first.pairs_processed, 1);
        assert_eq!(first.inserted, 3);

        // Re-running inserts nothing new.
        let second = engine.backfill_historical(2).await;
        assert_eq!(second.pairs_processed, 1);
        assert_eq!(second.inserted, 0);
    }

    #[tokio::test]
    async fn test_historical_series_covers_each_day_once() {
        let (store, _provider, engine) =
            engine_with(ScriptedProvider::new(BTreeMap::new()), test_config());
        for (day, rate) in [
            (date!(2024 - 06 - 01), "0.78"),
            (date!(2024 - 06 - 02), "0.79"),
            (date!(2024 - 06 - 03), "0.80"),
            (date!(2024 - 06 - 04), "0.81"),
            (date!(2024 - 06 - 05), "0.82"),
        ] {
            store
                .insert_historical_if_absent(code("USD"), code("GBP"), day, dec(rate))
                .await
                .unwrap();
        }
        // A same-day real-time overwrite must win inside the series too.
        store
            .upsert_real_time(code("USD"), code("GBP"), date!(2024 - 06 - 05), dec("0.85"))
            .await
            .unwrap();

        let series = engine
            .historical_series(
                code("USD"),
                code("GBP"),
                date!(2024 - 06 - 01),
                date!(2024 - 06 - 05),
            )
            .await
            .unwrap();

        assert_eq!(series.rates.len(), 5);
        assert_eq!(series.rates[&date!(2024 - 06 - 05)], dec("0.85"));
    }
}
