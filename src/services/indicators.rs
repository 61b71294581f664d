//! Technical indicators over the close series.
//!
//! Every function returns one entry per input value. Entries whose lookback
//! window is not yet filled are `None`; [`FillPolicy::Backfill`] replaces them
//! with the first computable value.

use log::debug;

use crate::errors::{DashboardError, Result};
use crate::models::bar::{IndicatorColumn, NormalizedTable};
use crate::models::request::IndicatorKind;

pub const SMA_WINDOW: usize = 20;
pub const EMA_WINDOW: usize = 20;
pub const RSI_WINDOW: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_STD_MULT: f64 = 2.0;

/// 回看窗口不足时的填充方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Leading entries stay undefined.
    #[default]
    LeaveUndefined,
    /// Leading entries take the first computable value.
    Backfill,
}

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(DashboardError::IndicatorError("Window must be at least 1".to_string()));
    }
    Ok(())
}

/// Simple moving average.
pub fn sma(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    check_window(window)?;
    Ok((0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                Some(values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
            }
        })
        .collect())
}

fn ema_series(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if values.len() < window {
        return out;
    }

    let k = 2.0 / (window as f64 + 1.0);
    // 以前 window 个值的 SMA 作为种子
    let mut prev = values[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = Some(prev);

    for i in window..values.len() {
        prev = (values[i] - prev) * k + prev;
        out[i] = Some(prev);
    }
    out
}

/// Exponential moving average, multiplier `2 / (window + 1)`, seeded with the
/// SMA of the first `window` values.
///
/// This is not the pandas `ewm(span, adjust=False)` recursion, which seeds from
/// the first value and defines every row: the first `window - 1` entries here
/// are `None`, and values near the start of the series differ from pandas. The
/// two converge as the seed's weight decays.
pub fn ema(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    check_window(window)?;
    Ok(ema_series(values, window))
}

/// Relative strength index with Wilder smoothing.
pub fn rsi(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    check_window(window)?;
    let mut out = vec![None; values.len()];
    if values.len() <= window {
        return Ok(out);
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let n = window as f64;

    let mut avg_gain = changes[..window].iter().map(|c| c.max(0.0)).sum::<f64>() / n;
    let mut avg_loss = changes[..window].iter().map(|c| (-c).max(0.0)).sum::<f64>() / n;
    out[window] = Some(rsi_value(avg_gain, avg_loss));

    for (j, &c) in changes.iter().enumerate().skip(window) {
        avg_gain = (avg_gain * (n - 1.0) + c.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-c).max(0.0)) / n;
        out[j + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    Ok(out)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // 无波动时取中值
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line, signal line and histogram.
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdSeries> {
    check_window(fast)?;
    check_window(slow)?;
    check_window(signal)?;
    if fast >= slow {
        return Err(DashboardError::IndicatorError(format!(
            "MACD fast window {} must be shorter than slow window {}", fast, slow
        )));
    }

    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal is the EMA of the defined tail of the MACD line.
    let mut signal_line = vec![None; values.len()];
    if let Some(start) = line.iter().position(Option::is_some) {
        let tail: Vec<f64> = line[start..].iter().flatten().copied().collect();
        for (j, v) in ema_series(&tail, signal).into_iter().enumerate() {
            signal_line[start + j] = v;
        }
    }

    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Ok(MacdSeries {
        line,
        signal: signal_line,
        histogram,
    })
}

pub struct BollingerSeries {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Bollinger Bands: SMA ± `std_mult` population standard deviations.
pub fn bollinger(values: &[f64], window: usize, std_mult: f64) -> Result<BollingerSeries> {
    check_window(window)?;
    let middle = sma(values, window)?;
    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];

    for (i, mid) in middle.iter().enumerate() {
        if let Some(mid) = *mid {
            let slice = &values[i + 1 - window..=i];
            let variance = slice.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / window as f64;
            let std_dev = variance.sqrt();
            upper[i] = Some(mid + std_mult * std_dev);
            lower[i] = Some(mid - std_mult * std_dev);
        }
    }

    Ok(BollingerSeries { upper, middle, lower })
}

pub fn apply_fill(mut values: Vec<Option<f64>>, policy: FillPolicy) -> Vec<Option<f64>> {
    if policy == FillPolicy::Backfill {
        if let Some(first) = values.iter().find_map(|v| *v) {
            for v in values.iter_mut().take_while(|v| v.is_none()) {
                *v = Some(first);
            }
        }
    }
    values
}

/// 指标计算器
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorCalculator {
    policy: FillPolicy,
}

impl IndicatorCalculator {
    pub fn new(policy: FillPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FillPolicy {
        self.policy
    }

    fn columns_for(&self, kind: IndicatorKind, closes: &[f64]) -> Result<Vec<IndicatorColumn>> {
        let series = match kind {
            IndicatorKind::Sma20 => vec![sma(closes, SMA_WINDOW)?],
            IndicatorKind::Ema20 => vec![ema(closes, EMA_WINDOW)?],
            IndicatorKind::Rsi14 => vec![rsi(closes, RSI_WINDOW)?],
            IndicatorKind::Macd => {
                let m = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
                vec![m.line, m.signal, m.histogram]
            }
            IndicatorKind::Bollinger => {
                let b = bollinger(closes, BOLLINGER_WINDOW, BOLLINGER_STD_MULT)?;
                vec![b.upper, b.middle, b.lower]
            }
        };

        Ok(kind
            .column_names()
            .iter()
            .zip(series)
            .map(|(name, values)| IndicatorColumn::new(name, apply_fill(values, self.policy)))
            .collect())
    }

    /// Returns a copy of `table` with the selected indicator columns appended.
    /// On error the input table is left untouched.
    pub fn append(&self, table: &NormalizedTable, kinds: &[IndicatorKind]) -> Result<NormalizedTable> {
        let closes = table.closes();
        if let Some(pos) = closes.iter().position(|c| !c.is_finite()) {
            return Err(DashboardError::IndicatorError(format!(
                "Close price at row {} of {} is not finite", pos, table.symbol()
            )));
        }

        let mut out = table.clone();
        for &kind in kinds {
            for column in self.columns_for(kind, &closes)? {
                out.push_column(column)?;
            }
        }

        debug!(
            "{}: appended {} indicator columns over {} rows",
            table.symbol(),
            out.columns().len() - table.columns().len(),
            out.len()
        );
        Ok(out)
    }
}
