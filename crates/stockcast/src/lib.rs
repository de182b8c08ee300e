//! Equity price forecasting service
//!
//! This crate predicts the next daily close of an NSE/BSE listed stock and
//! turns the forecast into a trade recommendation. It includes:
//!
//! - Price history from Yahoo Finance, split and dividend adjusted
//! - A technical indicator engine (SMA, EMA, RSI, MACD, Bollinger Bands,
//!   volume ratios)
//! - A sequence feature builder with a standardization scaler
//! - A stacked LSTM regressor trained from scratch per request
//! - News retrieval through a search-backed chat model and sentiment scoring
//! - A recommendation synthesizer (action, timing, confidence)
//! - An axum HTTP server exposing the three operations
//!
//! # Example
//!
//! ```rust,ignore
//! use stockcast::{Exchange, PredictorConfig, StockPredictor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PredictorConfig::builder().with_env_keys().build()?;
//!     let predictor = StockPredictor::new(config)?;
//!
//!     let response = predictor.predict("INFY", Exchange::Nse).await?;
//!     println!("{} at {:.2}", response.prediction.action, response.prediction.predicted_price);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod indicators;
pub mod news;
pub mod pipeline;
pub mod recommendation;
pub mod sentiment;
pub mod server;
pub mod types;

pub use config::{ForecasterConfig, PredictorConfig, PredictorConfigBuilder, SentimentBackend};
pub use error::{ErrorKind, Result, StockError};
pub use forecaster::TrainedForecaster;
pub use indicators::add_technical_indicators;
pub use news::{NewsSentimentFuser, parse_news_content};
pub use pipeline::{PredictionResponse, PredictionSummary, StockPredictor};
pub use sentiment::{FixedScorer, NeutralScorer, SentimentScorer, VaderScorer};
pub use types::{
    Action, Exchange, FeatureRow, MarketSentiment, ModelAccuracy, NewsArticle, PricePoint,
    Recommendation, Timing,
};
