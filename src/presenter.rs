use crate::models::bar::NormalizedTable;
use crate::models::metrics::MetricsSnapshot;
use crate::services::dashboard_service::{DashboardReport, WatchlistEntry};

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// 成交量千分位格式化
pub fn fmt_volume(volume: i64) -> String {
    let digits = volume.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if volume < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn render_metrics(metrics: &MetricsSnapshot) -> String {
    let pct = match metrics.percent_change {
        Some(p) => format!("{:+.2}%", p),
        None => "n/a".to_string(),
    };
    format!(
        "Last {:.2}  Change {:+.2} ({})  High {:.2}  Low {:.2}  Volume {}",
        metrics.last_close,
        metrics.change,
        pct,
        metrics.period_high,
        metrics.period_low,
        fmt_volume(metrics.total_volume)
    )
}

/// Last `limit` rows with every indicator column.
pub fn render_table(table: &NormalizedTable, limit: usize) -> String {
    let mut out = String::new();

    let mut header = format!(
        "{:<22} {:>10} {:>10} {:>10} {:>10} {:>14}",
        NormalizedTable::DATETIME_COLUMN, "Open", "High", "Low", "Close", "Volume"
    );
    for column in table.columns() {
        header.push_str(&format!(" {:>12}", column.name));
    }
    out.push_str(&header);
    out.push('\n');
    out.push_str(&format!("{:-<width$}\n", "", width = header.len()));

    let start = table.len().saturating_sub(limit);
    for (i, row) in table.rows().iter().enumerate().skip(start) {
        let mut line = format!(
            "{:<22} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14}",
            row.datetime.format("%Y-%m-%d %H:%M %Z").to_string(),
            row.open,
            row.high,
            row.low,
            row.close,
            fmt_volume(row.volume)
        );
        for column in table.columns() {
            line.push_str(&format!(" {:>12}", fmt_opt(column.values[i])));
        }
        out.push_str(&line);
        out.push('\n');
    }

    if start > 0 {
        out.push_str(&format!("... {} earlier rows not shown\n", start));
    }
    out
}

pub fn render_report(report: &DashboardReport, limit: usize) -> String {
    let request = &report.request;
    let mut out = format!(
        "{} | period {} | interval {} | chart {}\n",
        request.ticker(),
        request.period(),
        request.interval(),
        request.chart_style()
    );
    out.push_str(&render_metrics(&report.metrics));
    out.push('\n');

    match &report.table {
        Some(table) => {
            out.push('\n');
            out.push_str(&render_table(table, limit));
        }
        None => out.push_str("No data available\n"),
    }

    for warning in &report.warnings {
        out.push_str(&format!("warning: {}\n", warning));
    }
    out
}

pub fn render_watchlist(entries: &[WatchlistEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let line = match &entry.outcome {
            Ok(metrics) => format!("{:<8} {}", entry.symbol, render_metrics(metrics)),
            Err(e) => format!("{:<8} unavailable: {}", entry.symbol, e),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
