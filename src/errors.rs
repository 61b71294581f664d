use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    ArrowError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("No price data returned for {0}")]
    EmptyResult(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Normalization error: {0}")]
    NormalizationError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Indicator error: {0}")]
    IndicatorError(String),

    #[error("Timezone error: {0}")]
    TimezoneError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl From<arrow::error::ArrowError> for DashboardError {
    fn from(e: arrow::error::ArrowError) -> Self {
        DashboardError::ArrowError(e.to_string())
    }
}

// 用于从字符串创建错误
impl From<String> for DashboardError {
    fn from(s: String) -> Self {
        DashboardError::Unknown(s)
    }
}

impl From<&str> for DashboardError {
    fn from(s: &str) -> Self {
        DashboardError::Unknown(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = DashboardError::EmptyResult("AAPL".to_string());
        assert_eq!(e.to_string(), "No price data returned for AAPL");

        let e: DashboardError = "boom".into();
        assert!(matches!(e, DashboardError::Unknown(ref m) if m == "boom"));
    }
}
