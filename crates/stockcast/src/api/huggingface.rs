//! Hosted financial sentiment classifier (Hugging Face inference API)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, StockError};
use crate::sentiment::SentimentScorer;

/// Longest text sent to the classifier, in characters
const MAX_INPUT_CHARS: usize = 2_000;

/// Label whose probability is the sentiment score
const POSITIVE_LABEL: &str = "positive";

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The API returns either one list per input or a bare list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierResponse {
    Batched(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

impl ClassifierResponse {
    /// Probability of the positive label.
    ///
    /// When the reply is truncated to the top labels and `positive` is not
    /// among them, the probability mass the returned labels leave over is used.
    fn positive_probability(&self) -> Option<f64> {
        let labels = match self {
            Self::Batched(batches) => batches.first()?,
            Self::Single(labels) => labels,
        };
        if labels.is_empty() {
            return None;
        }
        let positive = labels
            .iter()
            .find(|l| l.label.eq_ignore_ascii_case(POSITIVE_LABEL))
            .map(|l| l.score);

        Some(positive.unwrap_or_else(|| {
            let returned: f64 = labels.iter().map(|l| l.score).sum();
            (1.0 - returned).clamp(0.0, 1.0)
        }))
    }
}

/// Text classifier served over HTTP
pub struct HostedClassifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HostedClassifier {
    /// `api_base` and `model` are joined as `{api_base}/{model}`
    pub fn new(
        api_base: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StockError::ConfigError(format!("classifier client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", api_base.trim_end_matches('/'), model),
            token,
        })
    }
}

#[async_trait]
impl SentimentScorer for HostedClassifier {
    async fn score(&self, text: &str) -> Result<f64> {
        let input: String = text.chars().take(MAX_INPUT_CHARS).collect();

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "inputs": input, "options": { "wait_for_model": true } }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StockError::NewsUnavailable(format!("classifier request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::NewsUnavailable(format!(
                "classifier error {status}: {body}"
            )));
        }

        let parsed: ClassifierResponse = response.json().await.map_err(|e| {
            StockError::NewsUnavailable(format!("failed to parse classifier response: {e}"))
        })?;
        let score = parsed.positive_probability().ok_or_else(|| {
            StockError::NewsUnavailable("classifier returned no labels".to_string())
        })?;

        debug!(score, "classified article");
        Ok(score)
    }

    fn name(&self) -> &'static str {
        "hosted"
    }
}
