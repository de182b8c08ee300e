//! Article sentiment scoring
//!
//! Every scorer maps a piece of text to a score in `[0, 1]` where higher is
//! more positive. Callers treat failures as neutral (0.5) through
//! [`normalize_score`].

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::atomic::{AtomicUsize, Ordering};
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::error::Result;

/// Score used when no classifier is available or scoring fails
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Text sentiment classifier
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Probability-like positivity of `text` in `[0, 1]`
    async fn score(&self, text: &str) -> Result<f64>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Clamp a scorer result into `[0, 1]`, falling back to neutral.
pub fn normalize_score(result: Result<f64>) -> f64 {
    match result {
        Ok(score) if score.is_finite() && (0.0..=1.0).contains(&score) => score,
        _ => NEUTRAL_SCORE,
    }
}

/// Offline lexicon scorer.
///
/// VADER's compound score in `[-1, 1]` is mapped linearly onto `[0, 1]`.
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentScorer for VaderScorer {
    async fn score(&self, text: &str) -> Result<f64> {
        let scores = self.analyzer.polarity_scores(text);
        let compound = scores["compound"];
        Ok(((compound + 1.0) / 2.0).clamp(0.0, 1.0))
    }

    fn name(&self) -> &'static str {
        "vader"
    }
}

/// Scorer used when no classifier is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralScorer;

#[async_trait]
impl SentimentScorer for NeutralScorer {
    async fn score(&self, _text: &str) -> Result<f64> {
        Ok(NEUTRAL_SCORE)
    }

    fn name(&self) -> &'static str {
        "neutral"
    }
}

/// Deterministic scorer returning preset scores in order, cycling
#[derive(Debug)]
pub struct FixedScorer {
    scores: Vec<f64>,
    next: AtomicUsize,
}

impl FixedScorer {
    /// Always return `score`
    pub fn new(score: f64) -> Self {
        Self::sequence(vec![score])
    }

    /// Return `scores` one by one, starting over after the last
    pub fn sequence(scores: Vec<f64>) -> Self {
        Self {
            scores,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, _text: &str) -> Result<f64> {
        if self.scores.is_empty() {
            return Ok(NEUTRAL_SCORE);
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(self.scores[i % self.scores.len()])
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
