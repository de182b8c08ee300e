//! LSTM price forecaster
//!
//! A stacked recurrent regressor trained from scratch on each request:
//!
//! ```text
//! LSTM(hidden, all steps) -> Dropout -> LSTM(hidden, last step) -> Dropout
//!     -> Dense(dense_units, ReLU) -> Dense(1)
//! ```
//!
//! Trained with mean squared error and Adam. The last `validation_split` of
//! the training windows (unshuffled) drives early stopping, and the weights
//! from the best epoch are restored before scoring.

mod adam;
mod dense;
mod lstm;
pub mod metrics;

use ndarray::{Array, Array1, Array2, Array3, Axis, Dimension, ShapeBuilder, s};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, instrument};

use crate::config::ForecasterConfig;
use crate::error::{Result, StockError};
use crate::features::{CLOSE_INDEX, NUM_FEATURES, SequenceDataset, StandardScaler};

use adam::Adam;
use dense::{Dense, DenseGrads, DenseMoments};
use lstm::{Lstm, LstmCache, LstmGrads, LstmMoments};
use metrics::{mean_squared_error, r2_score};

#[derive(Debug, Clone)]
struct Network {
    encoder: Lstm,
    summarizer: Lstm,
    hidden: Dense,
    output: Dense,
    dropout: f64,
}

/// Forward activations needed by the backward pass
struct Trace {
    encoder: LstmCache,
    encoder_mask: Option<Array3<f64>>,
    summarizer: LstmCache,
    summary_mask: Option<Array2<f64>>,
    steps: usize,
    head_input: Array2<f64>,
    hidden_pre: Array2<f64>,
    hidden_act: Array2<f64>,
}

struct Gradients {
    encoder: LstmGrads,
    summarizer: LstmGrads,
    hidden: DenseGrads,
    output: DenseGrads,
}

struct OptimizerState {
    encoder: LstmMoments,
    summarizer: LstmMoments,
    hidden: DenseMoments,
    output: DenseMoments,
}

/// Inverted dropout mask: kept units are scaled by `1 / (1 - rate)`
fn dropout_mask<D, Sh>(rng: &mut StdRng, shape: Sh, rate: f64) -> Array<f64, D>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
{
    let keep = 1.0 / (1.0 - rate);
    Array::from_shape_fn(shape, |_| if rng.random::<f64>() < rate { 0.0 } else { keep })
}

impl Network {
    fn new(rng: &mut StdRng, config: &ForecasterConfig) -> Self {
        Self {
            encoder: Lstm::new(rng, NUM_FEATURES, config.hidden_units),
            summarizer: Lstm::new(rng, config.hidden_units, config.hidden_units),
            hidden: Dense::new(rng, config.hidden_units, config.dense_units),
            output: Dense::new(rng, config.dense_units, 1),
            dropout: config.dropout,
        }
    }

    fn optimizer_state(&self) -> OptimizerState {
        OptimizerState {
            encoder: self.encoder.moments(),
            summarizer: self.summarizer.moments(),
            hidden: self.hidden.moments(),
            output: self.output.moments(),
        }
    }

    /// Dropout is active only when `rng` is given
    fn forward(&self, x: &Array3<f64>, mut rng: Option<&mut StdRng>) -> (Array1<f64>, Trace) {
        let steps = x.dim().1;

        let (encoded, encoder) = self.encoder.forward(x);
        let (encoded, encoder_mask) = match rng.as_deref_mut() {
            Some(rng) if self.dropout > 0.0 => {
                let mask = dropout_mask(rng, encoded.raw_dim(), self.dropout);
                (encoded * &mask, Some(mask))
            }
            _ => (encoded, None),
        };

        let (summarized, summarizer) = self.summarizer.forward(&encoded);
        let last = summarized.index_axis(Axis(1), steps - 1).to_owned();
        let (head_input, summary_mask) = match rng.as_deref_mut() {
            Some(rng) if self.dropout > 0.0 => {
                let mask = dropout_mask(rng, last.raw_dim(), self.dropout);
                (last * &mask, Some(mask))
            }
            _ => (last, None),
        };

        let hidden_pre = self.hidden.forward(&head_input);
        let hidden_act = hidden_pre.mapv(|v| v.max(0.0));
        let prediction = self.output.forward(&hidden_act).column(0).to_owned();

        let trace = Trace {
            encoder,
            encoder_mask,
            summarizer,
            summary_mask,
            steps,
            head_input,
            hidden_pre,
            hidden_act,
        };
        (prediction, trace)
    }

    fn predict(&self, x: &Array3<f64>) -> Array1<f64> {
        self.forward(x, None).0
    }

    fn backward(&self, trace: &Trace, d_prediction: &Array1<f64>) -> Gradients {
        let d_out = d_prediction.clone().insert_axis(Axis(1));
        let (output, d_act) = self.output.backward(&trace.hidden_act, &d_out);

        let d_pre = d_act * &trace.hidden_pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let (hidden, mut d_head) = self.hidden.backward(&trace.head_input, &d_pre);
        if let Some(mask) = &trace.summary_mask {
            d_head *= mask;
        }

        let mut d_summarized = Array3::zeros((d_head.nrows(), trace.steps, d_head.ncols()));
        d_summarized
            .index_axis_mut(Axis(1), trace.steps - 1)
            .assign(&d_head);
        let (summarizer, mut d_encoded) = self.summarizer.backward(&trace.summarizer, &d_summarized);
        if let Some(mask) = &trace.encoder_mask {
            d_encoded *= mask;
        }

        let (encoder, _) = self.encoder.backward(&trace.encoder, &d_encoded);

        Gradients {
            encoder,
            summarizer,
            hidden,
            output,
        }
    }

    fn apply(&mut self, adam: &Adam, grads: &Gradients, state: &mut OptimizerState) {
        self.encoder.apply(adam, &grads.encoder, &mut state.encoder);
        self.summarizer
            .apply(adam, &grads.summarizer, &mut state.summarizer);
        self.hidden.apply(adam, &grads.hidden, &mut state.hidden);
        self.output.apply(adam, &grads.output, &mut state.output);
    }
}

/// Per-epoch losses recorded during a fit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    /// Mean training loss per epoch
    pub train_loss: Vec<f64>,
    /// Loss monitored for early stopping per epoch
    pub monitored_loss: Vec<f64>,
    /// Zero-based epoch whose weights were kept
    pub best_epoch: usize,
    /// Whether patience ran out before the epoch limit
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Number of epochs actually run
    pub fn epochs_run(&self) -> usize {
        self.train_loss.len()
    }
}

/// A fitted model together with the scaler of the data it was trained on
#[derive(Debug, Clone)]
pub struct TrainedForecaster {
    network: Network,
    scaler: StandardScaler,
    window: usize,
    train_accuracy: f64,
    test_accuracy: f64,
    history: TrainingHistory,
}

impl TrainedForecaster {
    /// Fit a fresh network on `dataset`.
    ///
    /// Weight init, dropout masks and epoch shuffles all draw from
    /// `config.seed`, so the same dataset and config train the same model.
    #[instrument(skip_all, fields(train = dataset.y_train.len(), test = dataset.y_test.len()))]
    pub fn train(dataset: &SequenceDataset, config: &ForecasterConfig) -> Result<Self> {
        config.validate()?;
        if dataset.window() != config.window {
            return Err(StockError::TrainingFailed(format!(
                "dataset windows have {} steps but the model expects {}",
                dataset.window(),
                config.window
            )));
        }
        if dataset.y_train.is_empty() || dataset.y_test.is_empty() {
            return Err(StockError::TrainingFailed(
                "both train and test splits need at least one window".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut network = Network::new(&mut rng, config);

        let total = dataset.y_train.len();
        let mut fit_len = (total as f64 * (1.0 - config.validation_split)).floor() as usize;
        if fit_len == 0 {
            fit_len = total;
        }
        let fit_x = dataset.x_train.slice(s![..fit_len, .., ..]).to_owned();
        let fit_y = dataset.y_train.slice(s![..fit_len]).to_owned();
        let val_x = dataset.x_train.slice(s![fit_len.., .., ..]).to_owned();
        let val_y = dataset.y_train.slice(s![fit_len..]).to_owned();
        let has_validation = !val_y.is_empty();

        let mut adam = Adam::new(config.learning_rate);
        let mut state = network.optimizer_state();
        let mut history = TrainingHistory::default();
        let mut best_loss = f64::INFINITY;
        let mut best_network = network.clone();
        let mut wait = 0;
        let mut order: Vec<usize> = (0..fit_len).collect();

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            for batch in order.chunks(config.batch_size) {
                let x = fit_x.select(Axis(0), batch);
                let y = fit_y.select(Axis(0), batch);

                let (prediction, trace) = network.forward(&x, Some(&mut rng));
                let loss = mean_squared_error(y.view(), prediction.view());
                let d_prediction = (&prediction - &y) * (2.0 / batch.len() as f64);

                let grads = network.backward(&trace, &d_prediction);
                adam.step();
                network.apply(&adam, &grads, &mut state);

                loss_sum += loss * batch.len() as f64;
            }

            let train_loss = loss_sum / fit_len as f64;
            let monitored = if has_validation {
                mean_squared_error(val_y.view(), network.predict(&val_x).view())
            } else {
                train_loss
            };
            if !train_loss.is_finite() || !monitored.is_finite() {
                return Err(StockError::TrainingFailed(format!(
                    "loss diverged at epoch {}",
                    epoch + 1
                )));
            }

            debug!(epoch = epoch + 1, train_loss, monitored, "epoch complete");
            history.train_loss.push(train_loss);
            history.monitored_loss.push(monitored);

            if monitored < best_loss {
                best_loss = monitored;
                best_network = network.clone();
                history.best_epoch = epoch;
                wait = 0;
            } else {
                wait += 1;
                if wait >= config.patience {
                    history.stopped_early = true;
                    break;
                }
            }
        }

        let network = best_network;
        let train_accuracy = r2_score(
            dataset.y_train.view(),
            network.predict(&dataset.x_train).view(),
        );
        let test_accuracy = r2_score(
            dataset.y_test.view(),
            network.predict(&dataset.x_test).view(),
        );

        info!(
            epochs = history.epochs_run(),
            best_epoch = history.best_epoch,
            stopped_early = history.stopped_early,
            train_accuracy,
            test_accuracy,
            "forecaster trained"
        );

        Ok(Self {
            network,
            scaler: dataset.scaler.clone(),
            window: config.window,
            train_accuracy,
            test_accuracy,
            history,
        })
    }

    /// Predict the next close, in price units, from a (1, window, features) batch
    pub fn predict_next_close(&self, latest: &Array3<f64>) -> Result<f64> {
        if latest.dim() != (1, self.window, NUM_FEATURES) {
            return Err(StockError::TrainingFailed(format!(
                "expected a window of shape (1, {}, {NUM_FEATURES}), got {:?}",
                self.window,
                latest.shape()
            )));
        }

        let scaled = self.network.predict(latest)[0];
        let price = self.scaler.inverse_transform_column(scaled, CLOSE_INDEX);
        if !price.is_finite() {
            return Err(StockError::TrainingFailed(
                "model produced a non-finite prediction".to_string(),
            ));
        }
        Ok(price)
    }

    /// R² on the training windows
    pub fn train_accuracy(&self) -> f64 {
        self.train_accuracy
    }

    /// R² on the held-out test windows
    pub fn test_accuracy(&self) -> f64 {
        self.test_accuracy
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }
}
