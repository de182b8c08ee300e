//! Core data model shared by the prediction pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One trading session (OHLCV bar)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "Date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

/// A price bar enriched with technical indicators
///
/// Every derived field is defined for every row: leading values that a
/// rolling window cannot produce are filled by the indicator engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub price: PricePoint,
    #[serde(rename = "SMA_20")]
    pub sma_20: f64,
    #[serde(rename = "SMA_50")]
    pub sma_50: f64,
    #[serde(rename = "EMA_20")]
    pub ema_20: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MACD")]
    pub macd: f64,
    #[serde(rename = "Signal_Line")]
    pub signal_line: f64,
    #[serde(rename = "BB_middle")]
    pub bb_middle: f64,
    #[serde(rename = "BB_upper")]
    pub bb_upper: f64,
    #[serde(rename = "BB_lower")]
    pub bb_lower: f64,
    #[serde(rename = "Volume_MA")]
    pub volume_ma: f64,
    #[serde(rename = "Volume_Rate")]
    pub volume_rate: f64,
}

/// A news item parsed from provider text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
}

/// Listing exchange, which decides the Yahoo ticker suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Exchange {
    /// National Stock Exchange of India (`.NS`)
    #[default]
    #[serde(rename = "NSE")]
    Nse,
    /// Bombay Stock Exchange (`.BO`)
    #[serde(rename = "BSE")]
    Bse,
}

impl Exchange {
    /// `"NSE"` selects NSE; every other code falls back to BSE.
    pub fn from_code(code: &str) -> Self {
        if code == "NSE" { Self::Nse } else { Self::Bse }
    }

    /// Ticker suffix used by the price source
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Nse => "NS",
            Self::Bse => "BO",
        }
    }

    /// Map a bare symbol to the exchange-qualified ticker, e.g. `INFY` → `INFY.NS`
    pub fn ticker(self, symbol: &str) -> String {
        format!("{symbol}.{}", self.suffix())
    }
}

/// Recommended trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        })
    }
}

/// Holding horizon suggested alongside the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    #[serde(rename = "Short-term")]
    ShortTerm,
    #[serde(rename = "Long-term")]
    LongTerm,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShortTerm => "Short-term",
            Self::LongTerm => "Long-term",
        })
    }
}

/// Aggregate news sentiment for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSentiment {
    Positive,
    Negative,
    /// No articles were retrieved
    Neutral,
}

impl fmt::Display for MarketSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        })
    }
}

/// R² of the forecaster on its train and test windows
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelAccuracy {
    pub train: f64,
    pub test: f64,
}

/// Final verdict for one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub timing: Timing,
    /// Percent change from current to predicted price
    pub predicted_return: f64,
    /// Heuristic confidence in [50, 99.9]
    pub confidence: f64,
    pub current_price: f64,
    pub predicted_price: f64,
    /// Population std of day-over-day returns
    pub volatility: f64,
    pub market_sentiment: MarketSentiment,
    /// R² on the training split
    pub train_accuracy: f64,
    /// R² on the held-out split
    pub test_accuracy: f64,
}
