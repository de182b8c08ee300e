//! End-to-end pipeline tests against in-memory data sources

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stockcast::api::{NewsSource, PriceSource};
use stockcast::{
    ErrorKind, Exchange, FixedScorer, ForecasterConfig, MarketSentiment, NewsSentimentFuser,
    PricePoint, PredictorConfig, Result, SentimentBackend, StockError, StockPredictor,
};

struct StaticPrices {
    points: Vec<PricePoint>,
    calls: AtomicUsize,
}

impl StaticPrices {
    fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    async fn fetch_history(
        &self,
        ticker: &str,
        _period: &str,
        _interval: &str,
    ) -> Result<Vec<PricePoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.points.is_empty() {
            return Err(StockError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "No data found".to_string(),
            });
        }
        Ok(self.points.clone())
    }
}

struct StaticNews(&'static str);

#[async_trait]
impl NewsSource for StaticNews {
    async fn fetch_news_text(&self, _company: &str) -> Result<Option<String>> {
        Ok(Some(self.0.to_string()))
    }
}

fn history(n: usize) -> Vec<PricePoint> {
    let start = DateTime::<Utc>::from_timestamp(1_672_531_200, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 1_500.0 + (i as f64 * 0.15).sin() * 40.0 + i as f64 * 0.8;
            PricePoint {
                timestamp: start + ChronoDuration::days(i as i64),
                open: close - 3.0,
                high: close + 6.0,
                low: close - 7.0,
                close,
                volume: 150_000.0 + (i % 9) as f64 * 10_000.0,
            }
        })
        .collect()
}

fn small_forecaster() -> ForecasterConfig {
    ForecasterConfig {
        window: 20,
        hidden_units: 8,
        dense_units: 4,
        epochs: 5,
        batch_size: 16,
        patience: 3,
        learning_rate: 0.005,
        ..ForecasterConfig::default()
    }
}

fn build_predictor(
    prices: Arc<StaticPrices>,
    news: &'static str,
    scores: Vec<f64>,
    cache: bool,
) -> StockPredictor {
    let mut builder = PredictorConfig::builder()
        .sentiment_backend(SentimentBackend::Disabled)
        .forecaster(small_forecaster());
    if cache {
        builder = builder.model_cache_ttl(Duration::from_secs(300));
    }
    let config = builder.build().unwrap();

    let source: Arc<dyn NewsSource> = Arc::new(StaticNews(news));
    let fuser = NewsSentimentFuser::new(Some(source), Arc::new(FixedScorer::sequence(scores)));
    StockPredictor::with_sources(config, prices, fuser)
}

const NEWS: &str = "* **Order win**: Bagged a large contract.\n\
* **Expansion**: New plant commissioned.\n\
* **Guidance**: Management raised targets.";

#[tokio::test]
async fn predict_returns_full_response() {
    let prices = Arc::new(StaticPrices::new(history(120)));
    let predictor = build_predictor(prices, NEWS, vec![0.8, 0.7, 0.6], false);

    let response = predictor.predict("INFY", Exchange::Nse).await.unwrap();
    let p = &response.prediction;

    assert_eq!(response.stock_symbol, "INFY");
    assert_eq!(response.historical_data.len(), 120);
    assert_eq!(response.technical_indicators.len(), 120);
    assert_eq!(p.market_sentiment, MarketSentiment::Positive);
    assert!(p.predicted_price.is_finite());
    assert!((50.0..=99.9).contains(&p.confidence));
    assert_eq!(p.current_price, response.historical_data[119].close);
    assert_eq!(p.action == stockcast::Action::Buy, p.predicted_return > 0.35);

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["prediction"]["modelAccuracy"]["train"].is_number());
    assert!(json["technicalIndicators"][0]["SMA_20"].is_number());
    assert!(json["historicalData"][0]["Close"].is_number());
}

#[tokio::test]
async fn negative_news_yields_negative_sentiment() {
    let prices = Arc::new(StaticPrices::new(history(90)));
    let predictor = build_predictor(prices, NEWS, vec![0.5], false);

    let response = predictor.predict("TCS", Exchange::Bse).await.unwrap();
    assert_eq!(response.prediction.market_sentiment, MarketSentiment::Negative);
}

#[tokio::test]
async fn training_is_reproducible_across_requests() {
    let prices = Arc::new(StaticPrices::new(history(100)));
    let predictor = build_predictor(prices, NEWS, vec![0.9], false);

    let first = predictor.predict("INFY", Exchange::Nse).await.unwrap();
    let second = predictor.predict("INFY", Exchange::Nse).await.unwrap();

    let (a, b) = (&first.prediction.model_accuracy, &second.prediction.model_accuracy);
    assert!((a.train - b.train).abs() < 0.05);
    assert!((a.test - b.test).abs() < 0.05);
}

#[tokio::test]
async fn cached_model_is_reused() {
    let prices = Arc::new(StaticPrices::new(history(100)));
    let predictor = build_predictor(Arc::clone(&prices), NEWS, vec![0.9], true);

    let first = predictor.predict("INFY", Exchange::Nse).await.unwrap();
    let second = predictor.predict("INFY", Exchange::Nse).await.unwrap();

    assert_eq!(prices.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        first.prediction.predicted_price,
        second.prediction.predicted_price
    );
    assert_eq!(
        first.prediction.model_accuracy,
        second.prediction.model_accuracy
    );
}

#[tokio::test]
async fn short_histories_are_rejected() {
    let prices = Arc::new(StaticPrices::new(history(20)));
    let predictor = build_predictor(prices, NEWS, vec![0.9], false);
    let err = predictor.predict("INFY", Exchange::Nse).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);

    let prices = Arc::new(StaticPrices::new(history(19)));
    let predictor_19 = build_predictor(prices, NEWS, vec![0.9], false);
    let err = predictor_19.predict("INFY", Exchange::Nse).await.unwrap_err();
    assert!(matches!(err, StockError::InsufficientData { found: 19, .. }));
}

#[tokio::test]
async fn unknown_symbol_is_data_unavailable() {
    let prices = Arc::new(StaticPrices::new(Vec::new()));
    let predictor = build_predictor(prices, NEWS, vec![0.9], false);

    let err = predictor
        .technical_indicators("NOPE", Exchange::Nse)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataUnavailable);
}

#[tokio::test]
async fn news_endpoint_truncates() {
    let prices = Arc::new(StaticPrices::new(history(30)));
    let predictor = build_predictor(prices, NEWS, vec![0.9], false);

    let articles = predictor.news("INFY", 2).await;
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Order win");
    assert_eq!(articles[0].description, "Bagged a large contract.");
}
