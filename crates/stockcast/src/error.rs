//! Error types for stock prediction operations

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`StockError`]
///
/// Callers branch on the kind instead of matching message strings: every
/// kind except [`ErrorKind::NewsServiceDegraded`] aborts the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Price history missing or symbol unknown
    DataUnavailable,
    /// Too few data points to compute indicators or form a window
    InsufficientData,
    /// Model fit or inference failed
    TrainingFailed,
    /// News retrieval, parsing or scoring failed; never surfaced to callers
    NewsServiceDegraded,
    /// Invalid configuration or client construction failure
    Configuration,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Whether an error of this kind aborts the whole request
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::NewsServiceDegraded)
    }
}

/// Stock prediction specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },

    /// Not enough raw price points
    #[error("Insufficient data points for {symbol}. Found {found} points, need at least {required}.")]
    InsufficientData {
        symbol: String,
        found: usize,
        required: usize,
    },

    /// Not enough feature rows to form a single training window
    #[error("Insufficient rows to build training sequences: found {rows}, need at least {required}")]
    InsufficientWindows {
        rows: usize,
        required: usize,
    },

    /// Model training or inference failed
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// News provider or sentiment scorer failed
    #[error("News service unavailable: {0}")]
    NewsUnavailable(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Yahoo Finance transport, rate-limit or client failure
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl StockError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            Self::InsufficientData { .. } | Self::InsufficientWindows { .. } => {
                ErrorKind::InsufficientData
            }
            Self::TrainingFailed(_) => ErrorKind::TrainingFailed,
            Self::NewsUnavailable(_) => ErrorKind::NewsServiceDegraded,
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::IndicatorError(_)
            | Self::YahooFinanceError(_)
            | Self::NetworkError(_)
            | Self::JsonError(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `self.kind().is_fatal()`
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Chat failures only happen on the news path
impl From<stockcast_llm::ChatError> for StockError {
    fn from(err: stockcast_llm::ChatError) -> Self {
        StockError::NewsUnavailable(err.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::DataUnavailable {
            symbol: "INFY.NS".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for INFY.NS: No data found");

        let err = StockError::InsufficientData {
            symbol: "TCS.NS".to_string(),
            found: 12,
            required: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data points for TCS.NS. Found 12 points, need at least 20."
        );
    }

    #[test]
    fn test_error_kinds() {
        let windows = StockError::InsufficientWindows { rows: 60, required: 62 };
        assert_eq!(windows.kind(), ErrorKind::InsufficientData);
        assert!(windows.is_fatal());

        let news = StockError::NewsUnavailable("timeout".to_string());
        assert_eq!(news.kind(), ErrorKind::NewsServiceDegraded);
        assert!(!news.is_fatal());

        let training = StockError::TrainingFailed("loss diverged".to_string());
        assert_eq!(training.kind(), ErrorKind::TrainingFailed);
    }

    #[test]
    fn test_chat_error_conversion() {
        let err: StockError = stockcast_llm::ChatError::Unauthorized.into();
        assert_eq!(err.kind(), ErrorKind::NewsServiceDegraded);
        assert!(err.to_string().contains("API key"));
    }
}
