//! HTTP implementation of [`RateProvider`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_tracing::TracingMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use time::Date;

use crate::error::FxError;
use crate::limiter::HourlyRateLimiter;
use crate::provider::fault::{FaultInjector, NoFaults};
use crate::provider::{API_KEY_HEADER, RateProvider, endpoints};
use crate::store::UsageStore;
use crate::types::common::CurrencyCode;
use crate::types::serde_helpers;
use crate::types::wire::{HistoricalRates, RealTimeRates};

/// The external rate provider over HTTP.
///
/// Every fetch runs through three tiers:
///
/// 1. **Admission**: the hourly limiter is checked first; a denied client
///    fails with [`FxError::RateLimitExceeded`] before any network traffic.
/// 2. **Inner retries**: each network call goes through the retry middleware,
///    which re-sends on 5xx, 429, and transport failures with exponential
///    backoff (2^attempt seconds, bounded).
/// 3. **Outer attempts**: a call whose inner retries exhaust transiently is
///    tried again, up to the attempt cap (default 3, no delay between outer
///    attempts). Exhaustion surfaces as [`FxError::UpstreamTransport`],
///    never as an empty result.
///
/// Non-transient statuses fail fast: 429 maps to `RateLimitExceeded`, 401 to
/// `UpstreamAuth`, 404 to `UpstreamNotFound`. On terminal success the
/// payload is parsed and usage is recorded exactly once.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fx_rates::limiter::HourlyRateLimiter;
/// use fx_rates::provider::{HttpRateProvider, RateProvider};
/// use fx_rates::store::InMemoryUsageStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), fx_rates::FxError> {
/// let limiter = HourlyRateLimiter::new(Arc::new(InMemoryUsageStore::new()), 1000);
/// let provider = HttpRateProvider::builder("https://rates.example.com", limiter).build();
///
/// let api_key = "client-key".into();
/// let rates = provider.real_time_rates("USD".parse()?, &api_key).await?;
/// println!("{} targets for USD", rates.rates.len());
/// # Ok(())
/// # }
/// ```
pub struct HttpRateProvider<U> {
    http_client: ClientWithMiddleware,
    base_url: String,
    limiter: HourlyRateLimiter<U>,
    fault: Arc<dyn FaultInjector>,
    max_attempts: u32,
}

#[derive(Serialize)]
struct RealTimeQuery {
    base: CurrencyCode,
}

#[derive(Serialize)]
struct HistoricalQuery {
    base: CurrencyCode,
    target: CurrencyCode,
    #[serde(with = "serde_helpers::iso_date")]
    start_date: Date,
    #[serde(with = "serde_helpers::iso_date")]
    end_date: Date,
}

impl<U: UsageStore> HttpRateProvider<U> {
    /// Create a builder for a provider at `base_url`, admitted by `limiter`.
    pub fn builder(
        base_url: impl Into<String>,
        limiter: HourlyRateLimiter<U>,
    ) -> HttpRateProviderBuilder<U> {
        HttpRateProviderBuilder::new(base_url, limiter)
    }

    async fn admit(&self, api_key: &SecretString) -> Result<(), FxError> {
        if !self.limiter.is_allowed(api_key.expose_secret()).await? {
            tracing::warn!("rate limit exceeded, refusing upstream call");
            return Err(FxError::RateLimitExceeded);
        }
        Ok(())
    }

    /// Run the outer attempt loop for one GET.
    async fn get_with_attempts<T, Q>(
        &self,
        endpoint: &str,
        query: &Q,
        api_key: &SecretString,
    ) -> Result<T, FxError>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize,
    {
        let query_string = serde_urlencoded::to_string(query)
            .map_err(|e| FxError::InvalidResponse(e.to_string()))?;
        let mut url = url::Url::parse(&format!("{}{}", self.base_url, endpoint))?;
        url.set_query(Some(&query_string));

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.fetch_once(url.as_str(), api_key).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt < self.max_attempts {
                        tracing::warn!(attempt, error = %err, "transient upstream failure, retrying");
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(FxError::UpstreamTransport(format!(
            "{} attempts exhausted, last failure: {detail}",
            self.max_attempts
        )))
    }

    /// One outer attempt: a single send through the retry middleware.
    async fn fetch_once<T>(&self, url: &str, api_key: &SecretString) -> Result<T, FxError>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(fault) = self.fault.inject() {
            return Err(fault);
        }

        let response = self
            .http_client
            .get(url)
            .header(API_KEY_HEADER, api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            FxError::InvalidResponse(format!("failed to parse response: {e}. Body: {body}"))
        })
    }
}

impl<U: UsageStore> RateProvider for HttpRateProvider<U> {
    async fn real_time_rates(
        &self,
        base: CurrencyCode,
        api_key: &SecretString,
    ) -> Result<RealTimeRates, FxError> {
        self.admit(api_key).await?;
        let rates: RealTimeRates = self
            .get_with_attempts(endpoints::REAL_TIME, &RealTimeQuery { base }, api_key)
            .await?;
        self.limiter.record(api_key.expose_secret()).await?;
        tracing::debug!(%base, targets = rates.rates.len(), "fetched real-time rates");
        Ok(rates)
    }

    async fn historical_rates(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
        start: Date,
        end: Date,
        api_key: &SecretString,
    ) -> Result<HistoricalRates, FxError> {
        self.admit(api_key).await?;
        let query = HistoricalQuery {
            base,
            target,
            start_date: start,
            end_date: end,
        };
        let rates: HistoricalRates = self
            .get_with_attempts(endpoints::HISTORICAL, &query, api_key)
            .await?;
        self.limiter.record(api_key.expose_secret()).await?;
        tracing::debug!(%base, %target, days = rates.rates.len(), "fetched historical rates");
        Ok(rates)
    }
}

impl<U> std::fmt::Debug for HttpRateProvider<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRateProvider")
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Map a non-success upstream status to the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> FxError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FxError::RateLimitExceeded,
        StatusCode::UNAUTHORIZED => FxError::UpstreamAuth(format!("HTTP 401: {body}")),
        StatusCode::NOT_FOUND => FxError::UpstreamNotFound(format!("HTTP 404: {body}")),
        _ => FxError::UpstreamTransport(format!("HTTP {status}: {body}")),
    }
}

/// Builder for [`HttpRateProvider`].
pub struct HttpRateProviderBuilder<U> {
    base_url: String,
    limiter: HourlyRateLimiter<U>,
    timeout: Duration,
    max_attempts: u32,
    inner_retries: u32,
    retry_bounds: (Duration, Duration),
    fault: Arc<dyn FaultInjector>,
    user_agent: Option<String>,
}

impl<U: UsageStore> HttpRateProviderBuilder<U> {
    /// A builder with the production retry profile.
    pub fn new(base_url: impl Into<String>, limiter: HourlyRateLimiter<U>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            limiter,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            inner_retries: 3,
            retry_bounds: (Duration::from_secs(2), Duration::from_secs(8)),
            fault: Arc::new(NoFaults),
            user_agent: None,
        }
    }

    /// Per-request timeout (default 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap on outer attempts (default 3).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Cap on middleware retries within one outer attempt (default 3).
    pub fn inner_retries(mut self, retries: u32) -> Self {
        self.inner_retries = retries;
        self
    }

    /// Minimum and maximum backoff between inner retries (default 2s to 8s).
    pub fn retry_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.retry_bounds = (min, max);
        self
    }

    /// Install a fault-injection strategy. Test use only; the default
    /// [`NoFaults`] keeps production paths deterministic.
    pub fn fault_injector(mut self, fault: Arc<dyn FaultInjector>) -> Self {
        self.fault = fault;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the provider.
    pub fn build(self) -> HttpRateProvider<U> {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("fx-rates/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("fx-rates"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(self.retry_bounds.0, self.retry_bounds.1)
            .build_with_max_retries(self.inner_retries);

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        HttpRateProvider {
            http_client,
            base_url: self.base_url,
            limiter: self.limiter,
            fault: self.fault,
            max_attempts: self.max_attempts,
        }
    }
}
