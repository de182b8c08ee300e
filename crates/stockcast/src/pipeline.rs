//! End-to-end prediction pipeline
//!
//! One request runs sequentially: fetch history, compute indicators, build
//! windows, train (or reuse) a forecaster, predict the next close, score the
//! news and synthesize a recommendation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::{
    HostedClassifier, NewsSource, PerplexityNewsClient, PriceSource, YahooFinanceClient,
};
use crate::cache::{ModelCache, ModelKey};
use crate::config::{PredictorConfig, SentimentBackend};
use crate::error::{Result, StockError};
use crate::features::{SequenceDataset, build_sequences};
use crate::forecaster::TrainedForecaster;
use crate::indicators::add_technical_indicators;
use crate::news::NewsSentimentFuser;
use crate::recommendation::synthesize;
use crate::sentiment::{NeutralScorer, SentimentScorer, VaderScorer};
use crate::types::{
    Action, Exchange, FeatureRow, MarketSentiment, ModelAccuracy, NewsArticle, PricePoint,
    Recommendation, Timing,
};

/// `prediction` object of the predict response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSummary {
    pub action: Action,
    pub timing: Timing,
    pub confidence: f64,
    pub predicted_return: f64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub volatility: f64,
    pub market_sentiment: MarketSentiment,
    pub model_accuracy: ModelAccuracy,
}

impl From<&Recommendation> for PredictionSummary {
    fn from(rec: &Recommendation) -> Self {
        Self {
            action: rec.action,
            timing: rec.timing,
            confidence: rec.confidence,
            predicted_return: rec.predicted_return,
            current_price: rec.current_price,
            predicted_price: rec.predicted_price,
            volatility: rec.volatility,
            market_sentiment: rec.market_sentiment,
            model_accuracy: ModelAccuracy {
                train: rec.train_accuracy,
                test: rec.test_accuracy,
            },
        }
    }
}

/// Full predict response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Symbol as requested, without exchange suffix
    pub stock_symbol: String,
    pub prediction: PredictionSummary,
    pub historical_data: Vec<PricePoint>,
    pub technical_indicators: Vec<FeatureRow>,
}

/// Counts concurrent trainings per ticker
#[derive(Debug, Default)]
struct InFlight {
    tickers: Mutex<HashMap<String, usize>>,
}

/// Decrements the in-flight count on drop
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    ticker: String,
}

impl InFlight {
    fn enter(self: &Arc<Self>, ticker: &str) -> InFlightGuard {
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        let count = tickers.entry(ticker.to_string()).or_insert(0);
        if *count > 0 {
            warn!(ticker, in_flight = *count, "symbol is already being trained by another request");
        }
        *count += 1;

        InFlightGuard {
            in_flight: Arc::clone(self),
            ticker: ticker.to_string(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut tickers = self
            .in_flight
            .tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = tickers.get_mut(&self.ticker) {
            *count -= 1;
            if *count == 0 {
                tickers.remove(&self.ticker);
            }
        }
    }
}

/// Entry point for the three operations exposed over HTTP and the CLI
#[derive(Clone)]
pub struct StockPredictor {
    config: Arc<PredictorConfig>,
    prices: Arc<dyn PriceSource>,
    news: NewsSentimentFuser,
    cache: Option<ModelCache>,
    in_flight: Arc<InFlight>,
}

impl StockPredictor {
    /// Wire up Yahoo Finance, the configured news provider and scorer
    pub fn new(config: PredictorConfig) -> Result<Self> {
        config.validate()?;

        let prices: Arc<dyn PriceSource> = Arc::new(YahooFinanceClient::new(config.request_timeout));

        let source: Option<Arc<dyn NewsSource>> = match config
            .news_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        {
            Some(key) => {
                let client = PerplexityNewsClient::new(
                    key,
                    config.news_api_base.clone(),
                    config.news_model.clone(),
                    config.news_rate_limit,
                    config.request_timeout,
                )?;
                Some(Arc::new(client) as Arc<dyn NewsSource>)
            }
            None => {
                warn!("no news API key configured; market sentiment will be Neutral");
                None
            }
        };

        let scorer = build_scorer(&config)?;
        let news = NewsSentimentFuser::new(source, scorer);

        Ok(Self::with_sources(config, prices, news))
    }

    /// Use explicit collaborators
    pub fn with_sources(
        config: PredictorConfig,
        prices: Arc<dyn PriceSource>,
        news: NewsSentimentFuser,
    ) -> Self {
        let cache = config.model_cache_ttl.map(ModelCache::new);
        Self {
            config: Arc::new(config),
            prices,
            news,
            cache,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    async fn history(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        self.prices
            .fetch_history(
                ticker,
                &self.config.history_period,
                &self.config.history_interval,
            )
            .await
    }

    /// Indicator table for `symbol` on `exchange`
    #[instrument(skip(self))]
    pub async fn technical_indicators(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Vec<FeatureRow>> {
        let ticker = exchange.ticker(symbol);
        let prices = self.history(&ticker).await?;
        add_technical_indicators(&ticker, &prices)
    }

    /// Up to `num_articles` parsed news items; empty when news is unavailable
    pub async fn news(&self, symbol: &str, num_articles: usize) -> Vec<NewsArticle> {
        self.news.articles(symbol, num_articles).await
    }

    /// Train a forecaster on the latest history and recommend an action
    #[instrument(skip(self), fields(request_id = %Uuid::new_v4()))]
    pub async fn predict(&self, stock: &str, exchange: Exchange) -> Result<PredictionResponse> {
        let ticker = exchange.ticker(stock);
        info!(%ticker, "prediction requested");

        let prices = self.history(&ticker).await?;
        let rows = add_technical_indicators(&ticker, &prices)?;

        let forecaster_config = self.config.forecaster.clone();
        let dataset = Arc::new(build_sequences(
            &rows,
            forecaster_config.window,
            forecaster_config.test_fraction,
            forecaster_config.split_seed,
        )?);

        let model = self.forecaster(&ticker, &prices, Arc::clone(&dataset)).await?;
        let predicted_price = model.predict_next_close(&dataset.latest_window())?;

        let company = ticker.split('.').next().unwrap_or(stock);
        let news = self
            .news
            .market_sentiment(company, self.config.predict_news_articles)
            .await;

        let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
        let accuracy = ModelAccuracy {
            train: model.train_accuracy(),
            test: model.test_accuracy(),
        };
        let recommendation = synthesize(&closes, predicted_price, accuracy, news.sentiment);

        info!(
            %ticker,
            action = %recommendation.action,
            predicted_price,
            current_price = recommendation.current_price,
            sentiment = %recommendation.market_sentiment,
            "prediction complete"
        );

        Ok(PredictionResponse {
            stock_symbol: stock.to_string(),
            prediction: PredictionSummary::from(&recommendation),
            historical_data: prices,
            technical_indicators: rows,
        })
    }

    /// Cached forecaster for this exact history, or a freshly trained one
    async fn forecaster(
        &self,
        ticker: &str,
        prices: &[PricePoint],
        dataset: Arc<SequenceDataset>,
    ) -> Result<Arc<TrainedForecaster>> {
        let config = self.config.forecaster.clone();
        let key = self
            .cache
            .as_ref()
            .map(|_| ModelKey::new(ticker, prices, &config));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(model) = cache.get(key).await {
                info!(ticker, "reusing cached forecaster");
                return Ok(model);
            }
        }

        let _guard = self.in_flight.enter(ticker);
        let model = tokio::task::spawn_blocking(move || TrainedForecaster::train(&dataset, &config))
            .await
            .map_err(|e| StockError::TrainingFailed(format!("training task failed: {e}")))??;
        let model = Arc::new(model);

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, Arc::clone(&model)).await;
        }
        Ok(model)
    }
}

fn build_scorer(config: &PredictorConfig) -> Result<Arc<dyn SentimentScorer>> {
    let scorer: Arc<dyn SentimentScorer> = match config.sentiment_backend {
        SentimentBackend::Hosted => Arc::new(HostedClassifier::new(
            &config.classifier_api_base,
            &config.classifier_model,
            config.classifier_api_token.clone(),
            config.request_timeout,
        )?),
        SentimentBackend::Vader => Arc::new(VaderScorer::new()),
        SentimentBackend::Disabled => Arc::new(NeutralScorer),
    };
    Ok(scorer)
}
