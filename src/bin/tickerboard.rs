use tickerboard::config::Config;
use tickerboard::fetchers::base::PriceFetcher;
use tickerboard::fetchers::yahoo::YahooFetcher;
use tickerboard::models::request::{ChartStyle, DashboardRequest, IndicatorKind, Interval, Period};
use tickerboard::presenter;
use tickerboard::services::dashboard_service::DashboardService;
use tickerboard::services::indicators::FillPolicy;
use tickerboard::util::{self, arrow_utils};

use anyhow::{bail, Context};
use clap::{App, Arg, ArgMatches, SubCommand};
use log::{info, warn};
use std::sync::Arc;

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match matches.value_of(name) {
        Some(raw) => {
            let value = raw
                .parse::<T>()
                .with_context(|| format!("Invalid value for --{}: {}", name, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

// show 与 watchlist 共用的网络与时区参数
fn base_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = Config::new();

    if let Some(tz) = matches.value_of("timezone") {
        config = config.with_target_timezone(util::parse_timezone(tz)?);
    }
    if let Some(secs) = parse_number::<u64>(matches, "timeout")? {
        config = config.with_request_timeout_secs(secs);
    }
    if let Some(ms) = parse_number::<u64>(matches, "min-interval")? {
        config = config.with_min_request_interval_ms(ms);
    }

    Ok(config)
}

fn network_args<'a>() -> Vec<Arg<'a>> {
    vec![
        Arg::with_name("timeout")
            .long("timeout")
            .value_name("SECS")
            .help("HTTP request timeout in seconds (default: 30)")
            .takes_value(true),
        Arg::with_name("min-interval")
            .long("min-interval")
            .value_name("MS")
            .help("Minimum spacing between provider requests in milliseconds (default: 250)")
            .takes_value(true),
    ]
}

fn show_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = base_config(matches)?;

    if matches.is_present("backfill") {
        config = config.with_fill_policy(FillPolicy::Backfill);
    }
    if let Some(rows) = parse_number::<usize>(matches, "rows")? {
        config = config.with_display_rows(rows);
    }

    Ok(config)
}

fn build_request(matches: &ArgMatches) -> anyhow::Result<DashboardRequest> {
    let ticker = matches.value_of("symbol").unwrap_or("AAPL");
    let period = matches.value_of("period").unwrap_or("1d").parse::<Period>()?;

    let mut request = DashboardRequest::new(ticker, period)?;
    if let Some(interval) = matches.value_of("interval") {
        request = request.with_interval(interval.parse::<Interval>()?)?;
    }
    if let Some(style) = matches.value_of("chart") {
        request = request.with_chart_style(style.parse::<ChartStyle>()?);
    }
    if let Some(list) = matches.value_of("indicators") {
        request = request.with_indicators(IndicatorKind::parse_list(list)?);
    }

    Ok(request)
}

fn make_service(config: Config) -> anyhow::Result<DashboardService> {
    let fetcher: Arc<dyn PriceFetcher + Send + Sync> = Arc::new(YahooFetcher::new(&config)?);
    Ok(DashboardService::new(config, fetcher))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let app = App::new("tickerboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Stock price dashboard: metrics and technical indicators for a ticker");

    let app = app
        .subcommand(
            SubCommand::with_name("show")
                .about("Show price history, metrics and indicators for one ticker")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Stock symbol (e.g. AAPL)")
                        .takes_value(true)
                        .default_value("AAPL"),
                )
                .arg(
                    Arg::with_name("period")
                        .short('p')
                        .long("period")
                        .value_name("PERIOD")
                        .help("Period to load (1d, 1wk, 1mo, 1y, max)")
                        .takes_value(true)
                        .default_value("1d"),
                )
                .arg(
                    Arg::with_name("interval")
                        .short('i')
                        .long("interval")
                        .value_name("INTERVAL")
                        .help("Sampling interval (1m, 5m, 30m, 1h, 1d, 1wk); defaults per period")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("chart")
                        .long("chart")
                        .value_name("STYLE")
                        .help("Chart style (candlestick, line)")
                        .takes_value(true)
                        .default_value("candlestick"),
                )
                .arg(
                    Arg::with_name("indicators")
                        .long("indicators")
                        .value_name("LIST")
                        .help("Comma separated indicators (sma20, ema20, rsi14, macd, bbands)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("backfill")
                        .long("backfill")
                        .help("Backfill indicator values before the lookback window is filled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("rows")
                        .short('r')
                        .long("rows")
                        .value_name("ROWS")
                        .help("Number of trailing rows to display")
                        .takes_value(true)
                        .default_value("10"),
                )
                .arg(
                    Arg::with_name("timezone")
                        .long("timezone")
                        .value_name("TZ")
                        .help("Target IANA time zone")
                        .takes_value(true)
                        .default_value("America/New_York"),
                )
                .arg(
                    Arg::with_name("export")
                        .long("export")
                        .value_name("FILE")
                        .help("Write the table with indicator columns to an Arrow IPC file")
                        .takes_value(true),
                )
                .args(network_args()),
        )
        .subcommand(
            SubCommand::with_name("watchlist")
                .about("Summarize today's move for a list of symbols")
                .arg(
                    Arg::with_name("symbols")
                        .short('s')
                        .long("symbols")
                        .value_name("SYMBOLS")
                        .help("Comma separated symbols (default: AAPL,GOOGL,AMZN,MSFT)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("timezone")
                        .long("timezone")
                        .value_name("TZ")
                        .help("Target IANA time zone")
                        .takes_value(true),
                )
                .args(network_args()),
        )
        .subcommand(
            SubCommand::with_name("explore")
                .about("Print a table previously written with --export")
                .arg(
                    Arg::with_name("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .help("Arrow IPC file to read")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("limit")
                        .short('l')
                        .long("limit")
                        .value_name("LIMIT")
                        .help("Limit the number of rows to display")
                        .takes_value(true)
                        .default_value("10"),
                ),
        );

    let matches = app.get_matches();

    if let Some(matches) = matches.subcommand_matches("show") {
        let config = show_config(matches)?;
        let rows = config.display_rows;
        let request = build_request(matches)?;
        let service = make_service(config)?;

        let report = service.run(&request).await;
        print!("{}", presenter::render_report(&report, rows));

        if let Some(path) = matches.value_of("export") {
            match &report.table {
                Some(table) => {
                    arrow_utils::save_table_to_arrow(table, path)?;
                    info!("Exported {} rows to {}", table.len(), path);
                }
                None => warn!("Nothing to export for {}", request.ticker()),
            }
        }
    } else if let Some(matches) = matches.subcommand_matches("watchlist") {
        let mut config = base_config(matches)?;
        if let Some(list) = matches.value_of("symbols") {
            config = config.with_watchlist(util::parse_symbol_list(list));
        }
        if config.watchlist.is_empty() {
            bail!("No symbols given");
        }

        let service = make_service(config)?;
        let symbols = service.config().watchlist.clone();
        let entries = service.watchlist(&symbols).await;
        print!("{}", presenter::render_watchlist(&entries));
    } else if let Some(matches) = matches.subcommand_matches("explore") {
        let path = matches.value_of("file").unwrap_or_default();
        let limit = parse_number::<usize>(matches, "limit")?.unwrap_or(10);

        let table = arrow_utils::read_table_from_arrow(path)
            .with_context(|| format!("Failed to read {}", path))?;
        info!("Loaded {} rows for {} from {}", table.len(), table.symbol(), path);

        println!("{} ({})", table.symbol(), table.timezone().name());
        print!("{}", presenter::render_table(&table, limit));
    } else {
        info!("No command specified. Use --help for usage information.");
    }

    Ok(())
}
