use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;

use tickerboard::util::arrow_utils;
use tickerboard::{
    Config, DashboardError, DashboardRequest, DashboardService, FillPolicy, IndicatorKind,
    Interval, Period, PriceBar, PriceFetcher, PriceTable, Result, Stage,
};

enum Script {
    Bars(PriceTable),
    Fail(String),
    Empty,
    Panic,
}

/// 按代码返回预设结果的数据源
struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self {
            scripts: HashMap::new(),
        }
    }

    fn with(mut self, symbol: &str, script: Script) -> Self {
        self.scripts.insert(symbol.to_string(), script);
        self
    }
}

#[async_trait]
impl PriceFetcher for ScriptedFetcher {
    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_bars(&self, ticker: &str, _period: Period, _interval: Interval) -> Result<PriceTable> {
        match self.scripts.get(ticker) {
            Some(Script::Bars(table)) => Ok(table.clone()),
            Some(Script::Fail(msg)) => Err(DashboardError::ProviderError(msg.clone())),
            Some(Script::Empty) => Err(DashboardError::EmptyResult(ticker.to_string())),
            Some(Script::Panic) => panic!("scripted panic for {}", ticker),
            None => Err(DashboardError::UnknownTicker(ticker.to_string())),
        }
    }
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap()
}

/// Daily bars with closes 100, 101, ... and naive UTC timestamps.
fn rising_table(symbol: &str, n: usize) -> PriceTable {
    let bars = (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            PriceBar {
                timestamp: start() + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect();
    PriceTable::new(symbol, None, bars).unwrap()
}

fn service(fetcher: ScriptedFetcher, config: Config) -> DashboardService {
    DashboardService::new(config, Arc::new(fetcher))
}

#[tokio::test]
async fn empty_fetch_degrades_to_zeroed_report() {
    let svc = service(ScriptedFetcher::new().with("AAPL", Script::Empty), Config::new());
    let request = DashboardRequest::new("AAPL", Period::OneDay).unwrap();

    let report = svc.run(&request).await;

    assert!(report.table.is_none());
    assert!(report.metrics.is_zeroed());
    assert!(!report.is_complete());
    let stages: Vec<Stage> = report.warnings.iter().map(|w| w.stage).collect();
    assert_eq!(stages, vec![Stage::Fetch, Stage::Normalize, Stage::Metrics]);
}

#[tokio::test]
async fn full_run_produces_metrics_and_aligned_indicators() {
    let svc = service(
        ScriptedFetcher::new().with("AAPL", Script::Bars(rising_table("AAPL", 40))),
        Config::new(),
    );
    let request = DashboardRequest::new("aapl", Period::OneMonth).unwrap();

    let report = svc.run(&request).await;
    assert!(report.is_complete(), "{:?}", report.warnings);

    let m = &report.metrics;
    assert_eq!(m.last_close, 139.0);
    assert_eq!(m.change, 39.0);
    assert_eq!(m.percent_change, Some(39.0));
    assert_eq!(m.period_high, 140.0);
    assert_eq!(m.period_low, 99.0);
    assert_eq!(m.total_volume, 40_000);

    let table = report.table.expect("table");
    assert_eq!(table.len(), 40);
    assert_eq!(table.timezone(), chrono_tz::America::New_York);
    // 14:30 UTC on 2024-03-01 is 09:30 EST
    assert_eq!(table.rows()[0].datetime.hour(), 9);
    assert_eq!(table.rows()[0].datetime.minute(), 30);

    let expected: usize = IndicatorKind::ALL.iter().map(|k| k.column_names().len()).sum();
    assert_eq!(table.columns().len(), expected);
    for column in table.columns() {
        assert_eq!(column.values.len(), table.len(), "{}", column.name);
    }

    let sma = table.column("SMA_20").unwrap();
    assert!(sma.values[..19].iter().all(Option::is_none));
    assert_eq!(sma.values[39], Some(129.5));
    assert_eq!(table.column("RSI_14").unwrap().last_defined(), Some(100.0));
}

#[tokio::test]
async fn backfill_policy_reaches_the_pipeline() {
    let config = Config::new().with_fill_policy(FillPolicy::Backfill);
    let svc = service(
        ScriptedFetcher::new().with("MSFT", Script::Bars(rising_table("MSFT", 25))),
        config,
    );
    let request = DashboardRequest::new("MSFT", Period::OneMonth)
        .unwrap()
        .with_indicators(vec![IndicatorKind::Sma20]);

    let report = svc.run(&request).await;
    let table = report.table.unwrap();
    assert_eq!(table.columns().len(), 1);

    let sma = table.column("SMA_20").unwrap();
    assert!(sma.values.iter().all(Option::is_some));
    assert_eq!(sma.values[0], sma.values[19]);
}

#[tokio::test]
async fn bad_close_keeps_table_without_indicators() {
    let mut bars = rising_table("TSLA", 30).bars().to_vec();
    bars[12].close = f64::NAN;
    let table = PriceTable::new("TSLA", None, bars).unwrap();

    let svc = service(ScriptedFetcher::new().with("TSLA", Script::Bars(table)), Config::new());
    let request = DashboardRequest::new("TSLA", Period::OneMonth).unwrap();

    let report = svc.run(&request).await;

    let stages: Vec<Stage> = report.warnings.iter().map(|w| w.stage).collect();
    assert_eq!(stages, vec![Stage::Metrics, Stage::Indicators]);
    assert!(report.metrics.is_zeroed());

    let table = report.table.expect("normalized table survives");
    assert_eq!(table.len(), 30);
    assert!(table.columns().is_empty());
}

#[tokio::test]
async fn watchlist_isolates_failures_and_keeps_order() {
    let fetcher = ScriptedFetcher::new()
        .with("AAPL", Script::Bars(rising_table("AAPL", 5)))
        .with("BAD", Script::Fail("HTTP 500".to_string()))
        .with("BOOM", Script::Panic)
        .with("MSFT", Script::Bars(rising_table("MSFT", 3)));
    let svc = service(fetcher, Config::new());

    let symbols: Vec<String> = ["AAPL", "BAD", "BOOM", "MSFT", "NOPE"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let entries = svc.watchlist(&symbols).await;

    let order: Vec<&str> = entries.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(order, vec!["AAPL", "BAD", "BOOM", "MSFT", "NOPE"]);

    assert_eq!(entries[0].outcome.as_ref().unwrap().last_close, 104.0);
    assert!(entries[1].outcome.as_ref().unwrap_err().contains("HTTP 500"));
    assert!(entries[2].outcome.is_err());
    assert_eq!(entries[3].outcome.as_ref().unwrap().change, 2.0);
    assert!(entries[4].outcome.as_ref().unwrap_err().contains("NOPE"));
}

#[tokio::test]
async fn exported_table_reads_back_unchanged() {
    let svc = service(
        ScriptedFetcher::new().with("GOOGL", Script::Bars(rising_table("GOOGL", 35))),
        Config::new().with_target_timezone(Tz::Asia__Shanghai),
    );
    let request = DashboardRequest::new("GOOGL", Period::OneYear).unwrap();
    let table = svc.run(&request).await.table.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("googl.arrow");
    let path = path.to_str().unwrap();

    arrow_utils::save_table_to_arrow(&table, path).unwrap();
    let back = arrow_utils::read_table_from_arrow(path).unwrap();

    assert_eq!(back.symbol(), "GOOGL");
    assert_eq!(back.timezone(), Tz::Asia__Shanghai);
    assert_eq!(back.column("MACD").unwrap().values[24], None);
    assert_eq!(back, table);
}

#[test]
fn missing_export_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.arrow");
    assert!(arrow_utils::read_table_from_arrow(path.to_str().unwrap()).is_err());
}
