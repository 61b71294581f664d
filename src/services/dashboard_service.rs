use crate::config::Config;
use crate::errors::Result;
use crate::fetchers::base::PriceFetcher;
use crate::models::bar::{NormalizedTable, PriceTable};
use crate::models::metrics::MetricsSnapshot;
use crate::models::request::{DashboardRequest, IndicatorKind, Interval, Period};
use crate::services::indicators::IndicatorCalculator;
use crate::services::metrics;
use crate::services::normalizer::Normalizer;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Normalize,
    Metrics,
    Indicators,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Metrics => "metrics",
            Stage::Indicators => "indicators",
        };
        f.write_str(name)
    }
}

/// A stage failure shown to the user next to whatever partial output exists.
#[derive(Debug, Clone, PartialEq)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for StageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub request: DashboardRequest,
    /// Normalized table with the selected indicator columns, when available.
    pub table: Option<NormalizedTable>,
    pub metrics: MetricsSnapshot,
    pub warnings: Vec<StageWarning>,
}

impl DashboardReport {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// 自选股单行摘要
#[derive(Debug, Clone)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub outcome: std::result::Result<MetricsSnapshot, String>,
}

fn record(warnings: &mut Vec<StageWarning>, stage: Stage, message: String) {
    warn!("{} stage failed: {}", stage, message);
    warnings.push(StageWarning { stage, message });
}

/// 看板服务：抓取、归一化、统计和指标计算
pub struct DashboardService {
    config: Config,
    fetcher: Arc<dyn PriceFetcher + Send + Sync>,
    normalizer: Normalizer,
    calculator: IndicatorCalculator,
}

impl DashboardService {
    pub fn new(config: Config, fetcher: Arc<dyn PriceFetcher + Send + Sync>) -> Self {
        let normalizer = Normalizer::new(config.target_timezone);
        let calculator = IndicatorCalculator::new(config.fill_policy);
        debug!(
            "Dashboard service using {}: timezone={}, fill={:?}",
            fetcher.provider_name(),
            normalizer.target().name(),
            calculator.policy()
        );
        Self {
            config,
            fetcher,
            normalizer,
            calculator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the whole pipeline for one request. Each stage degrades to a safe
    /// default and records a warning instead of failing the run.
    pub async fn run(&self, request: &DashboardRequest) -> DashboardReport {
        info!(
            "Building dashboard for {} (period={}, interval={})",
            request.ticker(),
            request.period(),
            request.interval()
        );

        let mut warnings = Vec::new();
        let raw = self.fetch_stage(request, &mut warnings).await;
        let normalized = self.normalize_stage(raw.as_ref(), &mut warnings);
        let metrics = self.metrics_stage(normalized.as_ref(), &mut warnings);
        let table = self.indicator_stage(normalized, request.indicators(), &mut warnings);

        DashboardReport {
            request: request.clone(),
            table,
            metrics,
            warnings,
        }
    }

    pub async fn fetch_stage(
        &self,
        request: &DashboardRequest,
        warnings: &mut Vec<StageWarning>,
    ) -> Option<PriceTable> {
        match self
            .fetcher
            .fetch_bars(request.ticker(), request.period(), request.interval())
            .await
        {
            Ok(table) => Some(table),
            Err(e) => {
                record(
                    warnings,
                    Stage::Fetch,
                    format!("Failed to fetch data for {}: {}", request.ticker(), e),
                );
                None
            }
        }
    }

    pub fn normalize_stage(
        &self,
        table: Option<&PriceTable>,
        warnings: &mut Vec<StageWarning>,
    ) -> Option<NormalizedTable> {
        match self.normalizer.normalize(table) {
            Ok(t) => Some(t),
            Err(e) => {
                record(warnings, Stage::Normalize, e.to_string());
                None
            }
        }
    }

    pub fn metrics_stage(
        &self,
        table: Option<&NormalizedTable>,
        warnings: &mut Vec<StageWarning>,
    ) -> MetricsSnapshot {
        let result = match table {
            Some(t) => metrics::compute(t),
            None => {
                record(warnings, Stage::Metrics, "No data to compute metrics from".to_string());
                return MetricsSnapshot::zeroed();
            }
        };

        result.unwrap_or_else(|e| {
            record(warnings, Stage::Metrics, e.to_string());
            MetricsSnapshot::zeroed()
        })
    }

    /// An absent table stays absent; a failed computation returns the table
    /// without indicator columns.
    pub fn indicator_stage(
        &self,
        table: Option<NormalizedTable>,
        kinds: &[IndicatorKind],
        warnings: &mut Vec<StageWarning>,
    ) -> Option<NormalizedTable> {
        let table = match table {
            Some(t) => t,
            None => {
                debug!("Skipping indicators: no table");
                return None;
            }
        };

        match self.calculator.append(&table, kinds) {
            Ok(enriched) => Some(enriched),
            Err(e) => {
                record(warnings, Stage::Indicators, e.to_string());
                Some(table)
            }
        }
    }

    /// Same-day summary for each symbol. Symbols are fetched concurrently and
    /// each one fails on its own; entries come back in input order.
    pub async fn watchlist(&self, symbols: &[String]) -> Vec<WatchlistEntry> {
        let mut entries: Vec<WatchlistEntry> = symbols
            .iter()
            .map(|s| WatchlistEntry {
                symbol: s.clone(),
                outcome: Err("task did not complete".to_string()),
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (idx, symbol) in symbols.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let normalizer = self.normalizer;
            let symbol = symbol.clone();
            tasks.spawn(async move { (idx, summarize(fetcher, normalizer, &symbol).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    if let Err(e) = &outcome {
                        warn!("Watchlist entry {} failed: {}", entries[idx].symbol, e);
                    }
                    entries[idx].outcome = outcome.map_err(|e| e.to_string());
                }
                Err(e) => warn!("Watchlist task aborted: {}", e),
            }
        }

        info!(
            "Watchlist: {}/{} symbols summarized",
            entries.iter().filter(|e| e.outcome.is_ok()).count(),
            entries.len()
        );
        entries
    }
}

async fn summarize(
    fetcher: Arc<dyn PriceFetcher + Send + Sync>,
    normalizer: Normalizer,
    symbol: &str,
) -> Result<MetricsSnapshot> {
    let raw = fetcher.fetch_bars(symbol, Period::OneDay, Interval::OneMinute).await?;
    let table = normalizer.normalize(Some(&raw))?;
    metrics::compute(&table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DashboardError;
    use crate::services::indicators::FillPolicy;
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl PriceFetcher for Offline {
        fn provider_name(&self) -> &'static str {
            "offline"
        }

        async fn fetch_bars(&self, ticker: &str, _period: Period, _interval: Interval) -> Result<PriceTable> {
            Err(DashboardError::EmptyResult(ticker.to_string()))
        }
    }

    #[test]
    fn config_reaches_every_stage() {
        let config = Config::new()
            .with_target_timezone(chrono_tz::Europe::London)
            .with_fill_policy(FillPolicy::Backfill)
            .with_watchlist(vec!["TSLA".to_string()]);
        let svc = DashboardService::new(config, Arc::new(Offline));

        assert_eq!(svc.normalizer.target(), chrono_tz::Europe::London);
        assert_eq!(svc.calculator.policy(), FillPolicy::Backfill);
        assert_eq!(svc.config().watchlist, vec!["TSLA".to_string()]);
    }

    #[test]
    fn absent_table_skips_indicators_quietly() {
        let svc = DashboardService::new(Config::new(), Arc::new(Offline));
        let mut warnings = Vec::new();

        let table = svc.indicator_stage(None, &IndicatorKind::ALL, &mut warnings);
        assert!(table.is_none());
        assert!(warnings.is_empty());
    }
}
