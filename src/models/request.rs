use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::{DashboardError, Result};

/// 查询周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Period {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    Max,
}

/// K线采样粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
    OneWeek,
}

/// Request window handed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Named provider preset such as `1d` or `max`.
    Range(&'static str),
    /// Explicit `[start, end]` window.
    Between(DateTime<Utc>, DateTime<Utc>),
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneDay,
        Period::OneWeek,
        Period::OneMonth,
        Period::OneYear,
        Period::Max,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::OneWeek => "1wk",
            Period::OneMonth => "1mo",
            Period::OneYear => "1y",
            Period::Max => "max",
        }
    }

    /// 默认采样粒度
    pub fn default_interval(&self) -> Interval {
        match self {
            Period::OneDay => Interval::OneMinute,
            Period::OneWeek => Interval::ThirtyMinutes,
            Period::OneMonth => Interval::OneDay,
            Period::OneYear => Interval::OneWeek,
            Period::Max => Interval::OneWeek,
        }
    }

    /// The provider has no one-week preset, so that period becomes an explicit
    /// seven-day window ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> FetchWindow {
        match self {
            Period::OneWeek => FetchWindow::Between(now - Duration::days(7), now),
            other => FetchWindow::Range(other.code()),
        }
    }

    pub fn supports(&self, interval: Interval) -> bool {
        match interval {
            Interval::OneMinute | Interval::FiveMinutes => {
                matches!(self, Period::OneDay | Period::OneWeek)
            }
            Interval::ThirtyMinutes | Interval::OneHour => {
                matches!(self, Period::OneDay | Period::OneWeek | Period::OneMonth)
            }
            Interval::OneDay | Interval::OneWeek => true,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Period {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "day" => Ok(Period::OneDay),
            "1wk" | "1w" | "week" => Ok(Period::OneWeek),
            "1mo" | "month" => Ok(Period::OneMonth),
            "1y" | "year" => Ok(Period::OneYear),
            "max" => Ok(Period::Max),
            other => Err(DashboardError::InvalidRequest(format!("Unknown period: {}", other))),
        }
    }
}

impl Interval {
    pub fn code(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Interval {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" | "60m" => Ok(Interval::OneHour),
            "1d" => Ok(Interval::OneDay),
            "1wk" | "1w" => Ok(Interval::OneWeek),
            other => Err(DashboardError::InvalidRequest(format!("Unknown interval: {}", other))),
        }
    }
}

/// 图表样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ChartStyle {
    #[default]
    Candlestick,
    Line,
}

impl fmt::Display for ChartStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartStyle::Candlestick => f.write_str("candlestick"),
            ChartStyle::Line => f.write_str("line"),
        }
    }
}

impl FromStr for ChartStyle {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "candlestick" | "candle" => Ok(ChartStyle::Candlestick),
            "line" => Ok(ChartStyle::Line),
            other => Err(DashboardError::InvalidRequest(format!("Unknown chart style: {}", other))),
        }
    }
}

/// 技术指标种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorKind {
    Sma20,
    Ema20,
    Rsi14,
    Macd,
    Bollinger,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::Sma20,
        IndicatorKind::Ema20,
        IndicatorKind::Rsi14,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
    ];

    /// Names of the columns this indicator appends, in order.
    pub fn column_names(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Sma20 => &["SMA_20"],
            IndicatorKind::Ema20 => &["EMA_20"],
            IndicatorKind::Rsi14 => &["RSI_14"],
            IndicatorKind::Macd => &["MACD", "MACD_signal", "MACD_hist"],
            IndicatorKind::Bollinger => &["BB_upper", "BB_middle", "BB_lower"],
        }
    }

    /// 解析逗号分隔的指标列表
    pub fn parse_list(s: &str) -> Result<Vec<IndicatorKind>> {
        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = part.parse::<IndicatorKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl FromStr for IndicatorKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "sma20" | "sma" => Ok(IndicatorKind::Sma20),
            "ema20" | "ema" => Ok(IndicatorKind::Ema20),
            "rsi14" | "rsi" => Ok(IndicatorKind::Rsi14),
            "macd" => Ok(IndicatorKind::Macd),
            "bbands" | "bollinger" | "bb" => Ok(IndicatorKind::Bollinger),
            other => Err(DashboardError::InvalidRequest(format!("Unknown indicator: {}", other))),
        }
    }
}

/// 一次看板请求的全部输入，构造后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRequest {
    ticker: String,
    period: Period,
    interval: Interval,
    chart_style: ChartStyle,
    indicators: Vec<IndicatorKind>,
}

impl DashboardRequest {
    /// Builds a request with the period's default interval, candlestick chart
    /// and every indicator selected.
    pub fn new(ticker: &str, period: Period) -> Result<Self> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(DashboardError::InvalidRequest("Ticker must not be empty".to_string()));
        }

        Ok(Self {
            ticker,
            period,
            interval: period.default_interval(),
            chart_style: ChartStyle::default(),
            indicators: IndicatorKind::ALL.to_vec(),
        })
    }

    pub fn with_interval(mut self, interval: Interval) -> Result<Self> {
        if !self.period.supports(interval) {
            return Err(DashboardError::InvalidRequest(format!(
                "Interval {} is not available for period {}", interval, self.period
            )));
        }
        self.interval = interval;
        Ok(self)
    }

    pub fn with_chart_style(mut self, style: ChartStyle) -> Self {
        self.chart_style = style;
        self
    }

    pub fn with_indicators(mut self, indicators: Vec<IndicatorKind>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn chart_style(&self) -> ChartStyle {
        self.chart_style
    }

    pub fn indicators(&self) -> &[IndicatorKind] {
        &self.indicators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_interval_lookup() {
        assert_eq!(Period::OneDay.default_interval(), Interval::OneMinute);
        assert_eq!(Period::OneWeek.default_interval(), Interval::ThirtyMinutes);
        assert_eq!(Period::OneMonth.default_interval(), Interval::OneDay);
        assert_eq!(Period::OneYear.default_interval(), Interval::OneWeek);
        assert_eq!(Period::Max.default_interval(), Interval::OneWeek);
    }

    #[test]
    fn one_week_is_an_explicit_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        match Period::OneWeek.window(now) {
            FetchWindow::Between(start, end) => {
                assert_eq!(end, now);
                assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 3, 15, 0, 0).unwrap());
            }
            other => panic!("expected explicit window, got {:?}", other),
        }
        assert_eq!(Period::OneMonth.window(now), FetchWindow::Range("1mo"));
        assert_eq!(Period::Max.window(now), FetchWindow::Range("max"));
    }

    #[test]
    fn every_default_interval_is_supported() {
        for period in Period::ALL {
            assert!(period.supports(period.default_interval()), "{}", period);
        }
    }

    #[test]
    fn request_rejects_blank_ticker_and_bad_interval() {
        assert!(DashboardRequest::new("   ", Period::OneDay).is_err());

        let req = DashboardRequest::new(" msft ", Period::OneYear).unwrap();
        assert_eq!(req.ticker(), "MSFT");
        assert!(req.clone().with_interval(Interval::OneMinute).is_err());
        assert_eq!(req.with_interval(Interval::OneDay).unwrap().interval(), Interval::OneDay);
    }

    #[test]
    fn parse_indicator_list() {
        let kinds = IndicatorKind::parse_list("sma20, EMA-20,sma,bbands").unwrap();
        assert_eq!(
            kinds,
            vec![IndicatorKind::Sma20, IndicatorKind::Ema20, IndicatorKind::Bollinger]
        );
        assert!(IndicatorKind::parse_list("sma20,vwap").is_err());
    }

    #[test]
    fn parse_enums() {
        assert_eq!("1wk".parse::<Period>().unwrap(), Period::OneWeek);
        assert_eq!("60m".parse::<Interval>().unwrap(), Interval::OneHour);
        assert_eq!("Line".parse::<ChartStyle>().unwrap(), ChartStyle::Line);
        assert!("2d".parse::<Period>().is_err());
    }
}
