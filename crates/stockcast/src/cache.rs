//! Trained model cache
//!
//! Reuses a forecaster while the ticker's history is unchanged. A cached
//! model keeps the accuracy measured in the run that trained it. At most one
//! model per ticker is held; inserting a retrained model evicts the older one.

use cached::{Cached, TimedCache};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::ForecasterConfig;
use crate::forecaster::TrainedForecaster;
use crate::types::PricePoint;

/// Cache key: ticker plus a fingerprint of the data and hyper-parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub ticker: String,
    pub fingerprint: u64,
}

impl ModelKey {
    pub fn new(ticker: &str, history: &[PricePoint], config: &ForecasterConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        history.len().hash(&mut hasher);
        for point in history {
            point.timestamp.timestamp().hash(&mut hasher);
            for value in [point.open, point.high, point.low, point.close, point.volume] {
                value.to_bits().hash(&mut hasher);
            }
        }
        serde_json::to_string(config)
            .unwrap_or_default()
            .hash(&mut hasher);

        Self {
            ticker: ticker.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

/// Thread-safe, time-limited cache of trained forecasters
pub struct ModelCache {
    cache: Arc<RwLock<TimedCache<ModelKey, Arc<TrainedForecaster>>>>,
}

impl ModelCache {
    /// Create a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &ModelKey) -> Option<Arc<TrainedForecaster>> {
        let mut cache = self.cache.write().await;
        let hit = cache.cache_get(key).cloned();
        tracing::debug!(ticker = %key.ticker, hit = hit.is_some(), "model cache lookup");
        hit
    }

    /// Store `model`, dropping expired entries and stale models for the same ticker
    pub async fn insert(&self, key: ModelKey, model: Arc<TrainedForecaster>) {
        let mut cache = self.cache.write().await;
        cache.flush();

        let stale: Vec<ModelKey> = cache
            .get_store()
            .keys()
            .filter(|k| k.ticker == key.ticker && k.fingerprint != key.fingerprint)
            .cloned()
            .collect();
        for old in &stale {
            cache.cache_remove(old);
        }
        if !stale.is_empty() {
            tracing::debug!(ticker = %key.ticker, evicted = stale.len(), "replaced cached model");
        }

        let _ = cache.cache_set(key, model);
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for ModelCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_sequences;
    use crate::indicators::add_technical_indicators;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};

    fn history(n: usize, bump: f64) -> Vec<PricePoint> {
        let start = DateTime::<Utc>::from_timestamp(1_672_531_200, 0).unwrap();
        (0..n)
            .map(|i| PricePoint {
                timestamp: start + ChronoDuration::days(i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64 + bump,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_key_tracks_history_and_config() {
        let config = ForecasterConfig::default();
        let a = ModelKey::new("INFY.NS", &history(30, 0.0), &config);
        let b = ModelKey::new("INFY.NS", &history(30, 0.0), &config);
        assert_eq!(a, b);

        let changed = ModelKey::new("INFY.NS", &history(30, 0.5), &config);
        assert_ne!(a, changed);

        let other_config = ForecasterConfig {
            epochs: 5,
            ..ForecasterConfig::default()
        };
        assert_ne!(a, ModelKey::new("INFY.NS", &history(30, 0.0), &other_config));
    }

    fn tiny_model() -> Arc<TrainedForecaster> {
        let config = ForecasterConfig {
            window: 10,
            hidden_units: 2,
            dense_units: 2,
            epochs: 1,
            batch_size: 8,
            ..ForecasterConfig::default()
        };
        let prices: Vec<PricePoint> = history(40, 0.0)
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.close += (i as f64 * 0.7).sin();
                p.high = p.close + 1.0;
                p.low = p.close - 1.0;
                p
            })
            .collect();
        let rows = add_technical_indicators("TEST.NS", &prices).unwrap();
        let data =
            build_sequences(&rows, config.window, config.test_fraction, config.split_seed).unwrap();
        Arc::new(TrainedForecaster::train(&data, &config).unwrap())
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped_on_insert() {
        let cache = ModelCache::new(Duration::from_millis(1));
        let model = tiny_model();
        let config = ForecasterConfig::default();

        for (i, ticker) in ["A.NS", "B.NS", "C.NS", "D.NS"].iter().enumerate() {
            let key = ModelKey::new(ticker, &history(30, i as f64), &config);
            cache.insert(key, Arc::clone(&model)).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_retrained_model_replaces_previous_day() {
        let cache = ModelCache::new(Duration::from_secs(600));
        let model = tiny_model();
        let config = ForecasterConfig::default();

        let yesterday = ModelKey::new("INFY.NS", &history(30, 0.0), &config);
        let today = ModelKey::new("INFY.NS", &history(31, 0.0), &config);
        let other = ModelKey::new("TCS.NS", &history(30, 0.0), &config);

        cache.insert(yesterday.clone(), Arc::clone(&model)).await;
        cache.insert(other.clone(), Arc::clone(&model)).await;
        cache.insert(today.clone(), Arc::clone(&model)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&yesterday).await.is_none());
        assert!(cache.get(&today).await.is_some());
        assert!(cache.get(&other).await.is_some());
    }

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let cache = ModelCache::new(Duration::from_secs(60));
        let key = ModelKey::new("TCS.NS", &history(5, 0.0), &ForecasterConfig::default());
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }
}
