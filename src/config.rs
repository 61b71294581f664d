use chrono_tz::Tz;

use crate::services::indicators::FillPolicy;

pub const DEFAULT_WATCHLIST: [&str; 4] = ["AAPL", "GOOGL", "AMZN", "MSFT"];
pub const DEFAULT_PROVIDER_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub target_timezone: Tz,
    pub watchlist: Vec<String>,
    pub fill_policy: FillPolicy,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
    pub provider_base_url: String,
    pub display_rows: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            target_timezone: chrono_tz::America::New_York,
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            fill_policy: FillPolicy::LeaveUndefined,
            request_timeout_secs: 30,
            min_request_interval_ms: 250,
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            display_rows: 10,
        }
    }

    pub fn with_target_timezone(mut self, tz: Tz) -> Self {
        self.target_timezone = tz;
        self
    }

    pub fn with_watchlist(mut self, symbols: Vec<String>) -> Self {
        self.watchlist = symbols;
        self
    }

    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.fill_policy = policy;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_min_request_interval_ms(mut self, ms: u64) -> Self {
        self.min_request_interval_ms = ms;
        self
    }

    // 测试或代理场景下替换数据源地址
    pub fn with_provider_base_url(mut self, url: &str) -> Self {
        self.provider_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_display_rows(mut self, rows: usize) -> Self {
        self.display_rows = rows;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
