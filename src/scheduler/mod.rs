//! Periodic refresh driver.
//!
//! Drives the engine's refresh and backfill entry points on a timer instead
//! of relying on a framework-provided background task: every interval tick
//! refreshes real-time rates, and once per day (when the UTC hour matches the
//! configured backfill hour) runs the historical backfill.
//!
//! Shutdown is an explicit `watch` channel; the loop stops on the first
//! signal or when the sender is dropped. Batches in flight finish their
//! current item and the engine's per-item isolation bounds any partial work.
//!
//! # Example
//!
//! ```rust,ignore
//! let scheduler = RefreshScheduler::new(engine, SchedulerConfig::default());
//! let (shutdown_tx, shutdown_rx) = RefreshScheduler::shutdown_channel();
//! let task = tokio::spawn(scheduler.run(shutdown_rx));
//!
//! // ... later ...
//! let _ = shutdown_tx.send(());
//! task.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use time::{Date, OffsetDateTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::engine::{ConversionEngine, DEFAULT_LOOKBACK_DAYS};
use crate::provider::RateProvider;
use crate::store::RateStore;

/// Timing knobs for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to refresh real-time rates (default 15 minutes)
    pub refresh_interval: Duration,
    /// UTC hour at which the daily backfill runs (default 2)
    pub backfill_hour: u8,
    /// Trailing days each backfill covers (default 7)
    pub lookback_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15 * 60),
            backfill_hour: 2,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Runs the engine's refresh and backfill on a timer until told to stop.
pub struct RefreshScheduler<S, P> {
    engine: Arc<ConversionEngine<S, P>>,
    config: SchedulerConfig,
}

impl<S: RateStore, P: RateProvider> RefreshScheduler<S, P> {
    /// A scheduler driving `engine`.
    pub fn new(engine: Arc<ConversionEngine<S, P>>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// A shutdown channel pair for [`run`](Self::run).
    pub fn shutdown_channel() -> (watch::Sender<()>, watch::Receiver<()>) {
        watch::channel(())
    }

    /// Run until the shutdown channel signals or closes.
    ///
    /// The first refresh happens immediately; subsequent ones follow the
    /// configured interval. A missed tick (slow refresh) delays rather than
    /// bursts.
    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_backfill: Option<Date> = None;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("refresh scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    let summary = self.engine.refresh_real_time().await;
                    tracing::info!(
                        refreshed = summary.refreshed,
                        failed = summary.failed,
                        rates_stored = summary.rates_stored,
                        "real-time refresh complete"
                    );

                    let now = OffsetDateTime::now_utc();
                    if now.hour() == self.config.backfill_hour
                        && last_backfill != Some(now.date())
                    {
                        let summary = self
                            .engine
                            .backfill_historical(self.config.lookback_days)
                            .await;
                        tracing::info!(
                            pairs_processed = summary.pairs_processed,
                            pairs_failed = summary.pairs_failed,
                            inserted = summary.inserted,
                            "historical backfill complete"
                        );
                        last_backfill = Some(now.date());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::SecretString;
    use time::Date;

    use crate::engine::EngineConfig;
    use crate::error::FxError;
    use crate::store::InMemoryRateStore;
    use crate::types::common::CurrencyCode;
    use crate::types::wire::{HistoricalRates, RealTimeRates};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl RateProvider for CountingProvider {
        async fn real_time_rates(
            &self,
            base: CurrencyCode,
            _api_key: &SecretString,
        ) -> Result<RealTimeRates, FxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RealTimeRates {
                base,
                date: OffsetDateTime::now_utc().date(),
                rates: BTreeMap::new(),
            })
        }

        async fn historical_rates(
            &self,
            base: CurrencyCode,
            target: CurrencyCode,
            _start: Date,
            _end: Date,
            _api_key: &SecretString,
        ) -> Result<HistoricalRates, FxError> {
            Ok(HistoricalRates {
                base,
                target,
                rates: BTreeMap::new(),
            })
        }
    }

    fn scheduler_under_test(
        refresh_interval: Duration,
    ) -> (
        Arc<CountingProvider>,
        RefreshScheduler<InMemoryRateStore, CountingProvider>,
    ) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let config = EngineConfig::new("test-key".into())
            .with_base_currencies(["USD".parse().unwrap()]);
        let engine = Arc::new(ConversionEngine::new(
            Arc::new(InMemoryRateStore::new()),
            provider.clone(),
            config,
        ));
        let scheduler = RefreshScheduler::new(
            engine,
            SchedulerConfig {
                refresh_interval,
                ..SchedulerConfig::default()
            },
        );
        (provider, scheduler)
    }

    #[tokio::test]
    async fn test_stops_on_shutdown_signal() {
        let (_provider, scheduler) = scheduler_under_test(Duration::from_secs(3600));
        let (tx, rx) = RefreshScheduler::<InMemoryRateStore, CountingProvider>::shutdown_channel();

        let task = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler did not stop on shutdown signal")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_sender_drops() {
        let (_provider, scheduler) = scheduler_under_test(Duration::from_secs(3600));
        let (tx, rx) = RefreshScheduler::<InMemoryRateStore, CountingProvider>::shutdown_channel();

        let task = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler did not stop on channel close")
            .unwrap();
    }

    #[tokio::test]
    async fn test_refreshes_immediately_and_on_interval() {
        let (provider, scheduler) = scheduler_under_test(Duration::from_millis(20));
        let (tx, rx) = RefreshScheduler::<InMemoryRateStore, CountingProvider>::shutdown_channel();

        let task = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_millis(90)).await;
        let _ = tx.send(());
        task.await.unwrap();

        // One immediate refresh plus at least one interval tick.
        assert!(provider.calls.load(Ordering::SeqCst) >= 2);
    }
}
