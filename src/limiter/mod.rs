//! Per-client request quota over fixed hourly windows.
//!
//! Admission control for the external-rate fetcher: every client (API key)
//! gets a request budget per wall-clock hour, tracked in a shared
//! [`UsageStore`]. Both the allow/deny check and the usage recording use the
//! same hour-aligned window, so the two can never disagree near a window
//! edge.
//!
//! This component issues no network calls.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fx_rates::limiter::HourlyRateLimiter;
//! use fx_rates::store::InMemoryUsageStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), fx_rates::FxError> {
//! let limiter = HourlyRateLimiter::new(Arc::new(InMemoryUsageStore::new()), 1000);
//! if limiter.is_allowed("client-key").await? {
//!     // ... issue the upstream request ...
//!     limiter.record("client-key").await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use time::{OffsetDateTime, Time};

use crate::error::FxError;
use crate::store::UsageStore;
use crate::types::common::UsageWindow;

/// Requests allowed per client per hour when not configured otherwise.
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 1000;

/// The hour-aligned UTC window a timestamp falls into.
pub fn window_start(now: OffsetDateTime) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    now.replace_time(Time::MIDNIGHT) + time::Duration::hours(i64::from(now.hour()))
}

/// Fixed-window rate limiter keyed by API key.
pub struct HourlyRateLimiter<U> {
    usage: Arc<U>,
    limit: u32,
}

// Manual impl: `U` itself need not be Clone behind the Arc.
impl<U> Clone for HourlyRateLimiter<U> {
    fn clone(&self) -> Self {
        Self {
            usage: self.usage.clone(),
            limit: self.limit,
        }
    }
}

impl<U: UsageStore> HourlyRateLimiter<U> {
    /// A limiter allowing `limit` requests per client per hour.
    pub fn new(usage: Arc<U>, limit: u32) -> Self {
        Self { usage, limit }
    }

    /// The configured requests-per-hour limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether the client may issue a request right now.
    ///
    /// Allowed when no usage row exists for the current window, or the row's
    /// count is below the limit. Checking does not consume budget.
    pub async fn is_allowed(&self, api_key: &str) -> Result<bool, FxError> {
        self.is_allowed_at(api_key, OffsetDateTime::now_utc()).await
    }

    /// `is_allowed` against an explicit clock, for window-boundary tests.
    pub async fn is_allowed_at(
        &self,
        api_key: &str,
        now: OffsetDateTime,
    ) -> Result<bool, FxError> {
        match self.usage.find(api_key, window_start(now)).await? {
            None => Ok(true),
            Some(window) => Ok(window.request_count < self.limit),
        }
    }

    /// Record one request against the client's current window.
    ///
    /// Delegates to the store's atomic increment-or-insert, so concurrent
    /// recorders for the same key never lose counts.
    pub async fn record(&self, api_key: &str) -> Result<UsageWindow, FxError> {
        self.record_at(api_key, OffsetDateTime::now_utc()).await
    }

    /// `record` against an explicit clock, for window-boundary tests.
    pub async fn record_at(
        &self,
        api_key: &str,
        now: OffsetDateTime,
    ) -> Result<UsageWindow, FxError> {
        self.usage
            .increment_or_insert(api_key, window_start(now), now)
            .await
    }
}
