use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::errors::{DashboardError, Result};

/// 单根K线
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Fetched price history for one symbol.
///
/// When `timezone` is `None` the timestamps are naive wall-clock values. When
/// it is `Some(tz)` every timestamp is a UTC instant to be displayed in `tz`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    symbol: String,
    timezone: Option<Tz>,
    bars: Vec<PriceBar>,
}

impl PriceTable {
    /// Timestamps must be strictly increasing.
    pub fn new(symbol: &str, timezone: Option<Tz>, bars: Vec<PriceBar>) -> Result<Self> {
        if let Some(pos) = bars.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(DashboardError::DataError(format!(
                "Timestamps for {} are not strictly increasing at row {} ({} after {})",
                symbol,
                pos + 1,
                bars[pos + 1].timestamp,
                bars[pos].timestamp
            )));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            timezone,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// 归一化后的一行，时间列在最前
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub datetime: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// A derived numeric column aligned row-for-row with its table.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorColumn {
    pub fn new(name: &str, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }

    /// Latest defined value, if any.
    pub fn last_defined(&self) -> Option<f64> {
        self.values.iter().rev().find_map(|v| *v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    symbol: String,
    timezone: Tz,
    rows: Vec<NormalizedRow>,
    columns: Vec<IndicatorColumn>,
}

impl NormalizedTable {
    pub const DATETIME_COLUMN: &'static str = "Datetime";

    pub(crate) fn from_rows(symbol: &str, timezone: Tz, rows: Vec<NormalizedRow>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timezone,
            rows,
            columns: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    pub fn columns(&self) -> &[IndicatorColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&IndicatorColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 追加派生列；同名列会被替换，长度必须与行数一致
    pub fn push_column(&mut self, column: IndicatorColumn) -> Result<()> {
        if column.values.len() != self.rows.len() {
            return Err(DashboardError::IndicatorError(format!(
                "Column {} has {} values but table has {} rows",
                column.name,
                column.values.len(),
                self.rows.len()
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// View this table as a zoned price table, e.g. to feed it back through
    /// the normalizer.
    pub fn to_price_table(&self) -> PriceTable {
        let bars = self
            .rows
            .iter()
            .map(|r| PriceBar {
                timestamp: r.datetime.naive_utc(),
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
            .collect();

        PriceTable {
            symbol: self.symbol.clone(),
            timezone: Some(self.timezone),
            bars,
        }
    }
}

/// Converts a UTC instant into the given zone.
pub fn zoned(timezone: Tz, utc: &NaiveDateTime) -> DateTime<Tz> {
    timezone.from_utc_datetime(utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn bar(timestamp: NaiveDateTime, close: f64) -> PriceBar {
        PriceBar {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }
    }

    #[test]
    fn rejects_out_of_order_and_duplicate_timestamps() {
        let dup = vec![bar(ts(9, 30), 1.0), bar(ts(9, 30), 2.0)];
        assert!(PriceTable::new("X", None, dup).is_err());

        let backwards = vec![bar(ts(9, 31), 1.0), bar(ts(9, 30), 2.0)];
        assert!(PriceTable::new("X", None, backwards).is_err());

        let ok = vec![bar(ts(9, 30), 1.0), bar(ts(9, 31), 2.0)];
        assert_eq!(PriceTable::new("X", None, ok).unwrap().len(), 2);
    }

    #[test]
    fn push_column_checks_length_and_replaces_by_name() {
        let rows = vec![NormalizedRow {
            datetime: zoned(Tz::UTC, &ts(9, 30)),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
        }];
        let mut table = NormalizedTable::from_rows("X", Tz::UTC, rows);

        assert!(table.push_column(IndicatorColumn::new("A", vec![])).is_err());
        table.push_column(IndicatorColumn::new("A", vec![None])).unwrap();
        table.push_column(IndicatorColumn::new("A", vec![Some(2.0)])).unwrap();

        assert_eq!(table.columns().len(), 1);
        assert_eq!(table.column("A").unwrap().last_defined(), Some(2.0));
    }
}
