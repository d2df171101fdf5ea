//! Convert an amount between two currencies against a live rate endpoint.
//!
//! ```sh
//! FX_BASE_URL=https://rates.example.com FX_API_KEY=secret \
//!     cargo run --example convert -- USD GBP 100
//! ```

use std::sync::Arc;

use fx_rates::engine::{ConversionEngine, EngineConfig};
use fx_rates::limiter::HourlyRateLimiter;
use fx_rates::provider::HttpRateProvider;
use fx_rates::store::{InMemoryRateStore, InMemoryUsageStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let base_url = std::env::var("FX_BASE_URL")?;
    let api_key = std::env::var("FX_API_KEY")?;

    let mut args = std::env::args().skip(1);
    let from: fx_rates::CurrencyCode = args.next().as_deref().unwrap_or("USD").parse()?;
    let to: fx_rates::CurrencyCode = args.next().as_deref().unwrap_or("GBP").parse()?;
    let amount: rust_decimal::Decimal = args.next().as_deref().unwrap_or("100").parse()?;

    let limiter = HourlyRateLimiter::new(Arc::new(InMemoryUsageStore::new()), 1000);
    let provider = HttpRateProvider::builder(base_url, limiter).build();
    let engine = ConversionEngine::new(
        Arc::new(InMemoryRateStore::new()),
        Arc::new(provider),
        EngineConfig::new(api_key.into()),
    );

    match engine.convert(from, to, amount).await? {
        Some(conversion) => println!(
            "{} {} = {} {} (rate {} on {})",
            conversion.original_amount,
            conversion.from,
            conversion.converted_amount,
            conversion.to,
            conversion.rate,
            conversion.date,
        ),
        None => println!("no rate available for {from}/{to}"),
    }

    Ok(())
}
