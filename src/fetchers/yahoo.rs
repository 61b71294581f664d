use crate::config::Config;
use crate::errors::{DashboardError, Result};
use crate::fetchers::base::PriceFetcher;
use crate::models::bar::{PriceBar, PriceTable};
use crate::models::request::{FetchWindow, Interval, Period};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Yahoo Finance 行情抓取器
pub struct YahooFetcher {
    client: Client,
    base_url: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl YahooFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(DashboardError::RequestError)?;

        Ok(Self {
            client,
            base_url: config.provider_base_url.clone(),
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// 等待请求频率限制
    ///
    /// Each caller reserves the next free slot under the lock, so concurrent
    /// callers are released at least `min_interval` apart.
    async fn wait_for_rate_limit(&self) {
        let slot = {
            let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        let wait_time = slot.saturating_duration_since(Instant::now());
        if !wait_time.is_zero() {
            debug!("等待 {:?} 以遵守频率限制", wait_time);
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, ticker)
    }
}

/// Query string for a chart request. One-week requests carry an explicit
/// `period1`/`period2` window instead of a `range` preset.
pub fn query_params(period: Period, interval: Interval, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("interval", interval.code().to_string()),
        ("includePrePost", "false".to_string()),
        ("events", "div|split".to_string()),
    ];

    match period.window(now) {
        FetchWindow::Range(range) => params.push(("range", range.to_string())),
        FetchWindow::Between(start, end) => {
            params.push(("period1", start.timestamp().to_string()));
            params.push(("period2", end.timestamp().to_string()));
        }
    }

    params
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn finite_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Parse a chart endpoint body into a UTC-zoned price table.
///
/// Rows with a missing open/high/low/close are dropped, missing volume counts
/// as zero, and bars sharing a timestamp collapse to the last one.
pub fn parse_chart_response(body: &str, ticker: &str) -> Result<PriceTable> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(DashboardError::UnknownTicker(ticker.to_string()));
        }
        return Err(DashboardError::ProviderError(format!(
            "{}: {}", err.code, err.description
        )));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DashboardError::EmptyResult(ticker.to_string()))?;

    let quote = match result.indicators.quote.first() {
        Some(q) => q,
        None => return Err(DashboardError::EmptyResult(ticker.to_string())),
    };

    let mut bars: BTreeMap<NaiveDateTime, PriceBar> = BTreeMap::new();
    let mut skipped = 0usize;

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let fields = (
            DateTime::<Utc>::from_timestamp(ts, 0),
            finite_at(&quote.open, i),
            finite_at(&quote.high, i),
            finite_at(&quote.low, i),
            finite_at(&quote.close, i),
        );

        if let (Some(time), Some(open), Some(high), Some(low), Some(close)) = fields {
            let volume = finite_at(&quote.volume, i).map(|v| v.round() as i64).unwrap_or(0);
            let timestamp = time.naive_utc();
            bars.insert(timestamp, PriceBar { timestamp, open, high, low, close, volume });
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        debug!("{}: 跳过 {} 条不完整的K线", ticker, skipped);
    }

    if bars.is_empty() {
        return Err(DashboardError::EmptyResult(ticker.to_string()));
    }

    PriceTable::new(ticker, Some(Tz::UTC), bars.into_values().collect())
}

#[async_trait]
impl PriceFetcher for YahooFetcher {
    fn provider_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_bars(&self, ticker: &str, period: Period, interval: Interval) -> Result<PriceTable> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(DashboardError::InvalidRequest("Ticker must not be empty".to_string()));
        }
        if !period.supports(interval) {
            return Err(DashboardError::InvalidRequest(format!(
                "Interval {} is not available for period {}", interval, period
            )));
        }

        debug!("获取 {} 的K线数据 (period={}, interval={})", ticker, period, interval);

        // 限制请求频率
        self.wait_for_rate_limit().await;

        let url = self.chart_url(&ticker);
        let response = self
            .client
            .get(&url)
            .query(&query_params(period, interval, Utc::now()))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        match parse_chart_response(&text, &ticker) {
            Ok(table) => {
                info!("Fetched {} bars for {} from {}", table.len(), ticker, self.provider_name());
                Ok(table)
            }
            Err(DashboardError::JsonError(e)) if !status.is_success() => {
                warn!("{} returned HTTP {} for {}: {}", self.provider_name(), status, ticker, e);
                Err(DashboardError::ProviderError(format!("HTTP {} for {}", status, ticker)))
            }
            Err(e) => Err(e),
        }
    }
}
