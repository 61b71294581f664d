use chrono_tz::Tz;
use log::debug;

use crate::errors::{DashboardError, Result};
use crate::models::bar::{zoned, NormalizedRow, NormalizedTable, PriceTable};

/// 把K线时间统一到目标时区，并展开为显式的 `Datetime` 列
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    target: Tz,
}

impl Normalizer {
    pub fn new(target: Tz) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Tz {
        self.target
    }

    /// Naive timestamps are taken as UTC, then every timestamp is converted to
    /// the target zone. Row count and order are preserved.
    pub fn normalize(&self, table: Option<&PriceTable>) -> Result<NormalizedTable> {
        let table = match table {
            Some(t) if !t.is_empty() => t,
            Some(t) => {
                return Err(DashboardError::NormalizationError(format!(
                    "Price table for {} is empty", t.symbol()
                )))
            }
            None => {
                return Err(DashboardError::NormalizationError(
                    "No price table to normalize".to_string(),
                ))
            }
        };

        match table.timezone() {
            None => debug!("{}: 时间戳无时区信息，按 UTC 处理", table.symbol()),
            Some(tz) if tz != self.target => {
                debug!("{}: converting {} -> {}", table.symbol(), tz.name(), self.target.name())
            }
            Some(_) => {}
        }

        let rows = table
            .bars()
            .iter()
            .map(|bar| NormalizedRow {
                datetime: zoned(self.target, &bar.timestamp),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .collect();

        Ok(NormalizedTable::from_rows(table.symbol(), self.target, rows))
    }
}
