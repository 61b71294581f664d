use crate::errors::Result;
use crate::models::bar::PriceTable;
use crate::models::request::{Interval, Period};
use async_trait::async_trait;

/// Base trait for price history sources
#[async_trait]
pub trait PriceFetcher {
    /// Short provider name used in logs
    fn provider_name(&self) -> &'static str;

    /// Fetch OHLCV bars for `ticker` covering `period`, sampled at `interval`.
    /// An empty result set is an error, never an empty table.
    async fn fetch_bars(&self, ticker: &str, period: Period, interval: Interval) -> Result<PriceTable>;
}
