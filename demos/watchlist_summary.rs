use std::sync::Arc;

use tickerboard::presenter;
use tickerboard::{Config, DashboardService, YahooFetcher};

// 自选股当日涨跌一览
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::new();
    let symbols = config.watchlist.clone();
    let fetcher = Arc::new(YahooFetcher::new(&config)?);
    let service = DashboardService::new(config, fetcher);

    let entries = service.watchlist(&symbols).await;
    print!("{}", presenter::render_watchlist(&entries));

    Ok(())
}
