//! Sequence feature builder
//!
//! Scales the enriched feature table with one standardization scaler fitted
//! over the whole history and slices it into overlapping fixed-length windows
//! labelled with the next row's scaled close.

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis, s};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use statrs::statistics::Statistics;

use crate::error::{Result, StockError};
use crate::types::FeatureRow;

/// Model input columns, in order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "SMA_20",
    "SMA_50",
    "EMA_20",
    "RSI",
    "MACD",
    "Signal_Line",
    "BB_middle",
    "BB_upper",
    "BB_lower",
    "Volume_Rate",
];

/// Number of model input columns
pub const NUM_FEATURES: usize = 15;

/// Position of the close price in [`FEATURE_NAMES`]
pub const CLOSE_INDEX: usize = 3;

/// Project a row onto the model input columns
pub fn feature_vector(row: &FeatureRow) -> [f64; NUM_FEATURES] {
    [
        row.price.open,
        row.price.high,
        row.price.low,
        row.price.close,
        row.price.volume,
        row.sma_20,
        row.sma_50,
        row.ema_20,
        row.rsi,
        row.macd,
        row.signal_line,
        row.bb_middle,
        row.bb_upper,
        row.bb_lower,
        row.volume_rate,
    ]
}

/// Stack rows into an (n, NUM_FEATURES) matrix
pub fn feature_matrix(rows: &[FeatureRow]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), NUM_FEATURES), |(i, j)| {
        feature_vector(&rows[i])[j]
    })
}

/// Per-column standardization: `(x - mean) / scale`.
///
/// `scale` is the population standard deviation; constant columns use 1 so
/// they map to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column statistics over every row of `data`
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(StockError::TrainingFailed(
                "cannot fit a scaler on an empty feature matrix".to_string(),
            ));
        }

        let mut mean = Array1::zeros(data.ncols());
        let mut scale = Array1::ones(data.ncols());
        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            mean[j] = column.iter().mean();
            let std = column.iter().population_std_dev();
            if std.is_finite() && std > 10.0 * f64::EPSILON * mean[j].abs().max(1.0) {
                scale[j] = std;
            }
        }

        Ok(Self { mean, scale })
    }

    /// Column means
    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    /// Column scales
    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    /// Scale every row
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    /// Undo [`StandardScaler::transform`]
    pub fn inverse_transform(&self, data: &Array2<f64>) -> Array2<f64> {
        data * &self.scale + &self.mean
    }

    /// Invert a single scaled value of one column.
    ///
    /// Builds a zero row with only `column` populated, inverse-transforms the
    /// whole row and reads `column` back.
    pub fn inverse_transform_column(&self, value: f64, column: usize) -> f64 {
        let mut row = Array2::zeros((1, self.mean.len()));
        row[[0, column]] = value;
        self.inverse_transform(&row)[[0, column]]
    }
}

/// Scaled windows split into train and test sets
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    /// Scaler fitted over the full history
    pub scaler: StandardScaler,
    /// Every row, scaled
    pub scaled: Array2<f64>,
    /// Training windows, shape (n_train, window, NUM_FEATURES)
    pub x_train: Array3<f64>,
    /// Scaled next-close labels for the training windows
    pub y_train: Array1<f64>,
    /// Test windows, shape (n_test, window, NUM_FEATURES)
    pub x_test: Array3<f64>,
    /// Scaled next-close labels for the test windows
    pub y_test: Array1<f64>,
    window: usize,
}

impl SequenceDataset {
    /// Timesteps per window
    pub fn window(&self) -> usize {
        self.window
    }

    /// The most recent `window` scaled rows as a batch of one
    pub fn latest_window(&self) -> Array3<f64> {
        let start = self.scaled.nrows() - self.window;
        self.scaled
            .slice(s![start.., ..])
            .to_owned()
            .insert_axis(Axis(0))
    }
}

/// Rows needed for at least one training and one test window.
/// Terminates only for `test_fraction` in (0, 1).
fn min_rows(window: usize, test_fraction: f64) -> usize {
    let mut windows = 1;
    while windows - test_count(windows, test_fraction) < 1 {
        windows += 1;
    }
    window + windows
}

fn test_count(windows: usize, test_fraction: f64) -> usize {
    ((windows as f64 * test_fraction).ceil() as usize).max(1)
}

/// Scale `rows` and cut them into labelled windows.
///
/// Window `i` covers scaled rows `[i, i + window)` and is labelled with the
/// scaled close of row `i + window`. Windows are partitioned with a seeded
/// shuffle, so identical input always yields the identical split.
///
/// Fails with [`StockError::ConfigError`] unless `window > 0` and
/// `test_fraction` lies in (0, 1).
pub fn build_sequences(
    rows: &[FeatureRow],
    window: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<SequenceDataset> {
    if window == 0 {
        return Err(StockError::ConfigError("window must be greater than 0".to_string()));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(StockError::ConfigError(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let required = min_rows(window, test_fraction);
    if rows.len() < required {
        return Err(StockError::InsufficientWindows {
            rows: rows.len(),
            required,
        });
    }

    let raw = feature_matrix(rows);
    let scaler = StandardScaler::fit(&raw)?;
    let scaled = scaler.transform(&raw);

    let count = rows.len() - window;
    let mut order: Vec<usize> = (0..count).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = order.split_at(test_count(count, test_fraction));

    let (x_train, y_train) = gather(&scaled, train_idx, window);
    let (x_test, y_test) = gather(&scaled, test_idx, window);

    Ok(SequenceDataset {
        scaler,
        scaled,
        x_train,
        y_train,
        x_test,
        y_test,
        window,
    })
}

fn gather(scaled: &Array2<f64>, starts: &[usize], window: usize) -> (Array3<f64>, Array1<f64>) {
    let x = Array3::from_shape_fn((starts.len(), window, scaled.ncols()), |(i, t, f)| {
        scaled[[starts[i] + t, f]]
    });
    let y = starts
        .iter()
        .map(|&start| scaled[[start + window, CLOSE_INDEX]])
        .collect();
    (x, y)
}
