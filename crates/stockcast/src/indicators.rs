//! Technical indicator engine
//!
//! Turns a chronological OHLCV series into [`FeatureRow`]s. Each indicator is
//! first computed as a column with undefined leading values (rolling windows
//! that are not yet full, divisions by zero), then every column is filled
//! forward, then backward, then with zero.

use statrs::statistics::Statistics;
use ta::{Next, indicators::ExponentialMovingAverage};

use crate::error::{Result, StockError};
use crate::types::{FeatureRow, PricePoint};

/// Fewest price points the engine accepts
pub const MIN_PRICE_POINTS: usize = 20;

const SMA_SHORT: usize = 20;
const SMA_LONG: usize = 50;
const EMA_SPAN: usize = 20;
const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BB_PERIOD: usize = 20;
const BB_WIDTH: f64 = 2.0;
const VOLUME_PERIOD: usize = 20;

/// Column of indicator values; `None` marks an undefined entry
type Column = Vec<Option<f64>>;

/// Enrich a price series with technical indicators.
///
/// Fails with [`StockError::InsufficientData`] below [`MIN_PRICE_POINTS`].
/// The output has the same length as the input and no undefined values.
pub fn add_technical_indicators(symbol: &str, prices: &[PricePoint]) -> Result<Vec<FeatureRow>> {
    if prices.len() < MIN_PRICE_POINTS {
        return Err(StockError::InsufficientData {
            symbol: symbol.to_string(),
            found: prices.len(),
            required: MIN_PRICE_POINTS,
        });
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let volumes: Vec<f64> = prices.iter().map(|p| p.volume).collect();

    let sma_20 = rolling_mean(&closes, SMA_SHORT);
    let sma_50 = rolling_mean(&closes, SMA_LONG);
    let ema_20 = ema(&closes, EMA_SPAN)?;

    let rsi = rsi(&closes, RSI_PERIOD);

    let ema_fast = ema(&closes, MACD_FAST)?;
    let ema_slow = ema(&closes, MACD_SLOW)?;
    let macd: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd, MACD_SIGNAL)?;

    let bb_middle = rolling_mean(&closes, BB_PERIOD);
    let bb_std = rolling_std(&closes, BB_PERIOD);
    let bb_upper = combine(&bb_middle, &bb_std, |m, s| m + BB_WIDTH * s);
    let bb_lower = combine(&bb_middle, &bb_std, |m, s| m - BB_WIDTH * s);

    let volume_ma = rolling_mean(&volumes, VOLUME_PERIOD);
    let volume_rate: Column = volumes
        .iter()
        .zip(&volume_ma)
        .map(|(v, ma)| ma.and_then(|ma| finite(v / ma)))
        .collect();

    let sma_20 = fill(sma_20);
    let sma_50 = fill(sma_50);
    let rsi = fill(rsi);
    let bb_middle = fill(bb_middle);
    let bb_upper = fill(bb_upper);
    let bb_lower = fill(bb_lower);
    let volume_ma = fill(volume_ma);
    let volume_rate = fill(volume_rate);

    Ok(prices
        .iter()
        .enumerate()
        .map(|(i, price)| FeatureRow {
            price: *price,
            sma_20: sma_20[i],
            sma_50: sma_50[i],
            ema_20: ema_20[i],
            rsi: rsi[i],
            macd: macd[i],
            signal_line: signal_line[i],
            bb_middle: bb_middle[i],
            bb_upper: bb_upper[i],
            bb_lower: bb_lower[i],
            volume_ma: volume_ma[i],
            volume_rate: volume_rate[i],
        })
        .collect())
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Simple rolling mean; defined once `window` values are available
fn rolling_mean(values: &[f64], window: usize) -> Column {
    rolling(values, window, |w| w.iter().mean())
}

/// Rolling sample standard deviation (n - 1 denominator)
fn rolling_std(values: &[f64], window: usize) -> Column {
    rolling(values, window, |w| w.iter().std_dev())
}

fn rolling(values: &[f64], window: usize, stat: impl Fn(&[f64]) -> f64) -> Column {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                finite(stat(&values[i + 1 - window..=i]))
            }
        })
        .collect()
}

/// Exponential moving average without bias adjustment.
///
/// Seeded with the first value, then `y = a * x + (1 - a) * y` with
/// `a = 2 / (span + 1)`, which is the recursion `ta` implements.
fn ema(values: &[f64], span: usize) -> Result<Vec<f64>> {
    let mut indicator = ExponentialMovingAverage::new(span)
        .map_err(|e| StockError::IndicatorError(e.to_string()))?;
    Ok(values.iter().map(|&v| indicator.next(v)).collect())
}

/// RSI from simple rolling means of gains and losses.
///
/// The first difference is undefined and counts as neither gain nor loss.
/// A zero average loss yields 100 (or undefined when the gain is zero too).
fn rsi(closes: &[f64], period: usize) -> Column {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(0.0);
    losses.push(0.0);
    for pair in closes.windows(2) {
        let delta = pair[1] - pair[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    combine(&avg_gain, &avg_loss, |gain, loss| {
        let rs = gain / loss;
        100.0 - 100.0 / (1.0 + rs)
    })
}

fn combine(a: &Column, b: &Column, f: impl Fn(f64, f64) -> f64) -> Column {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => finite(f(*x, *y)),
            _ => None,
        })
        .collect()
}

/// Forward fill, then backward fill, then zero.
fn fill(column: Column) -> Vec<f64> {
    let mut last = None;
    let forward: Column = column
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect();

    let first_defined = forward.iter().flatten().next().copied();
    forward
        .into_iter()
        .map(|v| v.or(first_defined).unwrap_or(0.0))
        .collect()
}
