// 公开导出的模块，供外部使用
pub mod config;
pub mod errors;
pub mod fetchers;
pub mod models;
pub mod presenter;
pub mod services;
pub mod util;

// 重新导出常用类型，方便使用
pub use config::Config;
pub use errors::{DashboardError, Result};
pub use fetchers::base::PriceFetcher;
pub use fetchers::yahoo::YahooFetcher;
pub use models::bar::{IndicatorColumn, NormalizedRow, NormalizedTable, PriceBar, PriceTable};
pub use models::metrics::MetricsSnapshot;
pub use models::request::{ChartStyle, DashboardRequest, IndicatorKind, Interval, Period};
pub use services::dashboard_service::{DashboardReport, DashboardService, Stage, StageWarning, WatchlistEntry};
pub use services::indicators::FillPolicy;
