//! Recommendation synthesizer
//!
//! Pure functions turning a price history, a predicted next close and a
//! sentiment label into a [`Recommendation`].

use statrs::statistics::Statistics;

use crate::types::{Action, MarketSentiment, ModelAccuracy, Recommendation, Timing};

/// Predicted return (percent) above which the action is BUY
pub const BUY_THRESHOLD_PCT: f64 = 0.35;

/// Absolute predicted return (percent) below which timing is short-term
pub const SHORT_TERM_LIMIT_PCT: f64 = 2.0;

const MIN_CONFIDENCE: f64 = 50.0;
const MAX_CONFIDENCE: f64 = 99.9;

/// Population standard deviation of day-over-day fractional returns.
///
/// Zero when fewer than two closes are available.
pub fn volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .filter(|r| r.is_finite())
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().population_std_dev()
}

/// Percent change from `current` to `predicted`; zero when `current` is zero
pub fn predicted_return_pct(current: f64, predicted: f64) -> f64 {
    if current == 0.0 {
        return 0.0;
    }
    (predicted - current) / current * 100.0
}

/// Heuristic confidence, `95 - volatility * 1000` clamped to [50, 99.9]
pub fn confidence(volatility: f64) -> f64 {
    (95.0 - volatility * 1000.0).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

pub fn action_for(return_pct: f64) -> Action {
    if return_pct > BUY_THRESHOLD_PCT {
        Action::Buy
    } else {
        Action::Sell
    }
}

pub fn timing_for(return_pct: f64) -> Timing {
    if return_pct.abs() < SHORT_TERM_LIMIT_PCT {
        Timing::ShortTerm
    } else {
        Timing::LongTerm
    }
}

/// Combine the forecast and sentiment into a recommendation.
///
/// `closes` is the fetched history; its last value is the current price.
pub fn synthesize(
    closes: &[f64],
    predicted_price: f64,
    accuracy: ModelAccuracy,
    market_sentiment: MarketSentiment,
) -> Recommendation {
    let current_price = closes.last().copied().unwrap_or(0.0);
    let volatility = volatility(closes);
    let predicted_return = predicted_return_pct(current_price, predicted_price);

    Recommendation {
        action: action_for(predicted_return),
        timing: timing_for(predicted_return),
        predicted_return,
        confidence: confidence(volatility),
        current_price,
        predicted_price,
        volatility,
        market_sentiment,
        train_accuracy: accuracy.train,
        test_accuracy: accuracy.test,
    }
}
