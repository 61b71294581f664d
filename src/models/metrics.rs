use serde::Serialize;

/// 区间统计快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub last_close: f64,
    pub change: f64,
    /// `None` when the first close is zero and the ratio is undefined.
    pub percent_change: Option<f64>,
    pub period_high: f64,
    pub period_low: f64,
    pub total_volume: i64,
}

impl MetricsSnapshot {
    /// Placeholder shown when the metrics could not be computed.
    pub fn zeroed() -> Self {
        Self {
            last_close: 0.0,
            change: 0.0,
            percent_change: Some(0.0),
            period_high: 0.0,
            period_low: 0.0,
            total_volume: 0,
        }
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::zeroed()
    }
}
