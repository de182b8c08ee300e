//! Configuration for stock prediction operations

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the news provider key
pub const NEWS_API_KEY_ENV: &str = "PERPLEXITY_API_KEY";
/// Environment variable holding the hosted classifier token
pub const CLASSIFIER_TOKEN_ENV: &str = "HF_API_TOKEN";

/// Backend used to score article sentiment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    /// Hosted FinBERT classifier (Hugging Face inference API)
    #[default]
    Hosted,
    /// Local VADER lexicon scorer
    Vader,
    /// No classifier; every article scores neutral
    Disabled,
}

/// Hyper-parameters of the sequence model and its data split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecasterConfig {
    /// Timesteps per input window
    pub window: usize,
    /// Width of both recurrent layers
    pub hidden_units: usize,
    /// Width of the dense layer before the output unit
    pub dense_units: usize,
    /// Dropout rate after each recurrent layer
    pub dropout: f64,
    /// Maximum training epochs
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Fraction of the training split held out for early stopping
    pub validation_split: f64,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Fraction of windows held out as the test split
    pub test_fraction: f64,
    /// Seed for the train/test partition
    pub split_seed: u64,
    /// Seed for weight init, dropout masks and epoch shuffles
    pub seed: u64,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            window: 60,
            hidden_units: 80,
            dense_units: 40,
            dropout: 0.2,
            epochs: 80,
            batch_size: 32,
            validation_split: 0.2,
            patience: 9,
            learning_rate: 0.001,
            test_fraction: 0.2,
            split_seed: 42,
            seed: 42,
        }
    }
}

impl ForecasterConfig {
    /// Validate the hyper-parameters
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 || self.hidden_units == 0 || self.dense_units == 0 {
            return Err(StockError::ConfigError(
                "window, hidden_units and dense_units must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 || self.epochs == 0 {
            return Err(StockError::ConfigError(
                "batch_size and epochs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(StockError::ConfigError(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(StockError::ConfigError(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(StockError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(StockError::ConfigError(
                "learning_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the prediction pipeline and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// History span requested from the price source (e.g. "1y")
    pub history_period: String,

    /// Bar interval requested from the price source
    pub history_interval: String,

    /// Timeout applied to every outbound HTTP call
    pub request_timeout: Duration,

    /// News provider API key
    pub news_api_key: Option<String>,

    /// News provider base URL (OpenAI-compatible)
    pub news_api_base: String,

    /// News provider model
    pub news_model: String,

    /// News requests allowed per minute
    pub news_rate_limit: u32,

    /// Articles requested by the predict operation
    pub predict_news_articles: usize,

    /// Sentiment scoring backend
    pub sentiment_backend: SentimentBackend,

    /// Hosted classifier base URL
    pub classifier_api_base: String,

    /// Hosted classifier model id
    pub classifier_model: String,

    /// Hosted classifier token (optional)
    pub classifier_api_token: Option<String>,

    /// Reuse trained models for this long; `None` retrains on every request
    pub model_cache_ttl: Option<Duration>,

    /// Sequence model hyper-parameters
    pub forecaster: ForecasterConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_period: "1y".to_string(),
            history_interval: "1d".to_string(),
            request_timeout: Duration::from_secs(30),
            news_api_key: None,
            news_api_base: "https://api.perplexity.ai".to_string(),
            news_model: "sonar".to_string(),
            news_rate_limit: 60,
            predict_news_articles: 9,
            sentiment_backend: SentimentBackend::Hosted,
            classifier_api_base: "https://router.huggingface.co/hf-inference/models".to_string(),
            classifier_model: "yiyanghkust/finbert-tone".to_string(),
            classifier_api_token: None,
            model_cache_ttl: None,
            forecaster: ForecasterConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Create a new configuration builder
    pub fn builder() -> PredictorConfigBuilder {
        PredictorConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        const PERIODS: &[&str] = &["1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"];
        if !PERIODS.contains(&self.history_period.as_str()) {
            return Err(StockError::ConfigError(format!(
                "Unsupported history period '{}', expected one of {PERIODS:?}",
                self.history_period
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.news_rate_limit == 0 {
            return Err(StockError::ConfigError(
                "news_rate_limit must be greater than 0".to_string(),
            ));
        }

        self.forecaster.validate()
    }
}

/// Builder for PredictorConfig
#[derive(Debug, Default)]
pub struct PredictorConfigBuilder {
    history_period: Option<String>,
    request_timeout: Option<Duration>,
    news_api_key: Option<String>,
    news_api_base: Option<String>,
    news_model: Option<String>,
    news_rate_limit: Option<u32>,
    predict_news_articles: Option<usize>,
    sentiment_backend: Option<SentimentBackend>,
    classifier_api_token: Option<String>,
    model_cache_ttl: Option<Duration>,
    forecaster: Option<ForecasterConfig>,
}

impl PredictorConfigBuilder {
    /// Set the history period
    pub fn history_period(mut self, period: impl Into<String>) -> Self {
        self.history_period = Some(period.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the news provider key
    pub fn news_api_key(mut self, key: impl Into<String>) -> Self {
        self.news_api_key = Some(key.into());
        self
    }

    /// Set the news provider base URL
    pub fn news_api_base(mut self, base: impl Into<String>) -> Self {
        self.news_api_base = Some(base.into());
        self
    }

    /// Set the news provider model
    pub fn news_model(mut self, model: impl Into<String>) -> Self {
        self.news_model = Some(model.into());
        self
    }

    /// Set the news request quota per minute
    pub fn news_rate_limit(mut self, per_minute: u32) -> Self {
        self.news_rate_limit = Some(per_minute);
        self
    }

    /// Set the number of articles used by predict
    pub fn predict_news_articles(mut self, count: usize) -> Self {
        self.predict_news_articles = Some(count);
        self
    }

    /// Set the sentiment backend
    pub fn sentiment_backend(mut self, backend: SentimentBackend) -> Self {
        self.sentiment_backend = Some(backend);
        self
    }

    /// Set the hosted classifier token
    pub fn classifier_api_token(mut self, token: impl Into<String>) -> Self {
        self.classifier_api_token = Some(token.into());
        self
    }

    /// Enable the trained-model cache with the given lifetime
    pub fn model_cache_ttl(mut self, ttl: Duration) -> Self {
        self.model_cache_ttl = Some(ttl);
        self
    }

    /// Set the forecaster hyper-parameters
    pub fn forecaster(mut self, forecaster: ForecasterConfig) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    /// Load the news key and classifier token from environment
    pub fn with_env_keys(mut self) -> Self {
        if let Ok(key) = std::env::var(NEWS_API_KEY_ENV) {
            self.news_api_key = Some(key);
        }
        if let Ok(token) = std::env::var(CLASSIFIER_TOKEN_ENV) {
            self.classifier_api_token = Some(token);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PredictorConfig> {
        let defaults = PredictorConfig::default();

        let config = PredictorConfig {
            history_period: self.history_period.unwrap_or(defaults.history_period),
            history_interval: defaults.history_interval,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            news_api_key: self.news_api_key,
            news_api_base: self.news_api_base.unwrap_or(defaults.news_api_base),
            news_model: self.news_model.unwrap_or(defaults.news_model),
            news_rate_limit: self.news_rate_limit.unwrap_or(defaults.news_rate_limit),
            predict_news_articles: self
                .predict_news_articles
                .unwrap_or(defaults.predict_news_articles),
            sentiment_backend: self.sentiment_backend.unwrap_or(defaults.sentiment_backend),
            classifier_api_base: defaults.classifier_api_base,
            classifier_model: defaults.classifier_model,
            classifier_api_token: self.classifier_api_token,
            model_cache_ttl: self.model_cache_ttl,
            forecaster: self.forecaster.unwrap_or(defaults.forecaster),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PredictorConfig::default();
        assert_eq!(config.history_period, "1y");
        assert_eq!(config.predict_news_articles, 9);
        assert_eq!(config.forecaster.window, 60);
        assert_eq!(config.forecaster.patience, 9);
        assert!(config.model_cache_ttl.is_none());
        assert!(config.validate().is_ok());
        assert!(
            config
                .classifier_api_base
                .starts_with("https://router.huggingface.co/")
        );
    }

    #[test]
    fn test_config_builder() {
        let config = PredictorConfig::builder()
            .history_period("2y")
            .news_api_key("pplx-test")
            .request_timeout(Duration::from_secs(10))
            .sentiment_backend(SentimentBackend::Vader)
            .build()
            .unwrap();

        assert_eq!(config.history_period, "2y");
        assert_eq!(config.news_api_key.as_deref(), Some("pplx-test"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.sentiment_backend, SentimentBackend::Vader);
    }

    #[test]
    fn test_validation_rejects_bad_period() {
        let result = PredictorConfig::builder().history_period("7d").build();
        assert!(matches!(result, Err(StockError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = PredictorConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forecaster_validation() {
        let bad_dropout = ForecasterConfig {
            dropout: 1.0,
            ..Default::default()
        };
        assert!(bad_dropout.validate().is_err());

        let bad_split = ForecasterConfig {
            test_fraction: 0.0,
            ..Default::default()
        };
        assert!(bad_split.validate().is_err());

        let no_validation = ForecasterConfig {
            validation_split: 0.0,
            ..Default::default()
        };
        assert!(no_validation.validate().is_ok());
    }
}
