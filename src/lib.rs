//! # fx-rates
//!
//! An async currency conversion library built around an unreliable external
//! rate provider: fetched rates are cached in a pluggable store, upstream
//! calls sit behind a per-client hourly quota, and transient failures are
//! retried with bounded exponential backoff.
//!
//! ## Features
//!
//! - Real-time and historical exchange rates with exact `rust_decimal`
//!   arithmetic (no implicit rounding)
//! - Upsert-latest semantics for real-time rates, write-once semantics for
//!   historical ones
//! - Hour-aligned per-client rate limiting checked before any network call
//! - Bounded retries with failure classification (auth, not-found, quota,
//!   transport), never an ambiguous empty result
//! - A timer-driven refresher with clean shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fx_rates::engine::{ConversionEngine, EngineConfig};
//! use fx_rates::limiter::HourlyRateLimiter;
//! use fx_rates::provider::HttpRateProvider;
//! use fx_rates::store::{InMemoryRateStore, InMemoryUsageStore};
//!
//! #[tokio::main]
//! async fn main() -> fx_rates::Result<()> {
//!     let limiter = HourlyRateLimiter::new(Arc::new(InMemoryUsageStore::new()), 1000);
//!     let provider = HttpRateProvider::builder("https://rates.example.com", limiter).build();
//!     let engine = ConversionEngine::new(
//!         Arc::new(InMemoryRateStore::new()),
//!         Arc::new(provider),
//!         EngineConfig::new("client-key".into())
//!             .with_base_currencies(["USD".parse()?, "EUR".parse()?]),
//!     );
//!
//!     match engine.convert("USD".parse()?, "GBP".parse()?, "100".parse().unwrap()).await? {
//!         Some(conversion) => println!("100 USD = {} GBP", conversion.converted_amount),
//!         None => println!("no rate available for USD/GBP"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod limiter;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{BoundaryClass, FxError};
pub use types::common::{Conversion, CurrencyCode, CurrencyPairConfig, ExchangeRateRecord};

/// Result type alias using FxError
pub type Result<T> = std::result::Result<T, FxError>;
