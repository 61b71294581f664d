use crate::errors::{DashboardError, Result};
use crate::models::bar::NormalizedTable;
use crate::models::metrics::MetricsSnapshot;

/// 计算区间统计：最新价、涨跌额、涨跌幅、最高、最低、成交量合计
pub fn compute(table: &NormalizedTable) -> Result<MetricsSnapshot> {
    let rows = table.rows();
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(DashboardError::MetricsError(format!(
                "No rows for {}", table.symbol()
            )))
        }
    };

    if let Some(row) = rows
        .iter()
        .find(|r| !(r.close.is_finite() && r.high.is_finite() && r.low.is_finite()))
    {
        return Err(DashboardError::MetricsError(format!(
            "Non-finite price for {} at {}", table.symbol(), row.datetime
        )));
    }

    let change = last.close - first.close;
    // 首根收盘价为 0 时涨跌幅无意义
    let percent_change = if first.close == 0.0 {
        None
    } else {
        Some(change / first.close * 100.0)
    };

    let period_high = rows.iter().map(|r| r.high).fold(f64::NEG_INFINITY, f64::max);
    let period_low = rows.iter().map(|r| r.low).fold(f64::INFINITY, f64::min);

    let total_volume = rows
        .iter()
        .try_fold(0i64, |acc, r| acc.checked_add(r.volume))
        .ok_or_else(|| {
            DashboardError::MetricsError(format!("Volume overflow for {}", table.symbol()))
        })?;

    Ok(MetricsSnapshot {
        last_close: last.close,
        change,
        percent_change,
        period_high,
        period_low,
        total_volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bar::{PriceBar, PriceTable};
    use crate::services::normalizer::Normalizer;
    use chrono::NaiveDate;
    use chrono_tz::Tz;

    fn normalized(rows: &[(f64, f64, f64, i64)]) -> NormalizedTable {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close, volume))| PriceBar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open: close,
                high,
                low,
                close,
                volume,
            })
            .collect();
        let table = PriceTable::new("TEST", Some(Tz::UTC), bars).unwrap();
        Normalizer::new(Tz::UTC).normalize(Some(&table)).unwrap()
    }

    #[test]
    fn basic_snapshot() {
        let t = normalized(&[
            (101.0, 99.0, 100.0, 10),
            (106.0, 100.0, 105.0, 20),
            (104.0, 97.5, 98.0, 30),
            (111.0, 98.0, 110.0, 40),
        ]);
        let m = compute(&t).unwrap();

        assert_eq!(m.last_close, 110.0);
        assert_eq!(m.change, 110.0 - 100.0);
        assert_eq!(m.percent_change, Some(10.0));
        assert_eq!(m.period_high, 111.0);
        assert_eq!(m.period_low, 97.5);
        assert_eq!(m.total_volume, 100);
    }

    #[test]
    fn change_is_exact_difference() {
        let t = normalized(&[(0.3, 0.1, 0.1, 1), (0.4, 0.2, 0.3, 1)]);
        let m = compute(&t).unwrap();
        assert_eq!(m.change, 0.3 - 0.1);
        assert_eq!(m.percent_change, Some((0.3 - 0.1) / 0.1 * 100.0));
    }

    #[test]
    fn zero_first_close_yields_sentinel() {
        let t = normalized(&[(1.0, 0.0, 0.0, 5), (2.0, 0.5, 1.5, 5)]);
        let m = compute(&t).unwrap();
        assert_eq!(m.change, 1.5);
        assert_eq!(m.percent_change, None);
    }

    #[test]
    fn single_row() {
        let t = normalized(&[(12.0, 10.0, 11.0, 7)]);
        let m = compute(&t).unwrap();
        assert_eq!(m.change, 0.0);
        assert_eq!(m.percent_change, Some(0.0));
        assert_eq!(m.total_volume, 7);
    }

    #[test]
    fn volume_overflow_is_an_error() {
        let t = normalized(&[(1.0, 1.0, 1.0, i64::MAX), (1.0, 1.0, 1.0, 1)]);
        assert!(matches!(
            compute(&t).unwrap_err(),
            DashboardError::MetricsError(_)
        ));
    }

    #[test]
    fn non_finite_price_is_an_error() {
        let t = normalized(&[(1.0, 1.0, 1.0, 1), (f64::NAN, 1.0, 1.0, 1)]);
        assert!(compute(&t).is_err());
    }
}
