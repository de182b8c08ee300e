//! LSTM layer with back-propagation through time.
//!
//! For each timestep the layer computes, with gates packed as `[i, f, g, o]`:
//!
//! ```text
//! z   = x_t · W_x + h_{t-1} · W_h + b
//! i   = sigmoid(z_i)      f = sigmoid(z_f)
//! g   = tanh(z_g)         o = sigmoid(z_o)
//! c_t = f * c_{t-1} + i * g
//! h_t = o * tanh(c_t)
//! ```

use ndarray::{Array1, Array2, Array3, Axis, s};
use rand::Rng;

use super::adam::{Adam, Moments};

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Glorot-uniform matrix of shape (fan_in, fan_out)
pub(crate) fn glorot_uniform(rng: &mut impl Rng, fan_in: usize, fan_out: usize) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.random_range(-limit..limit))
}

#[derive(Debug, Clone)]
pub(crate) struct Lstm {
    w_x: Array2<f64>,
    w_h: Array2<f64>,
    b: Array1<f64>,
    hidden: usize,
}

/// Activations kept from a forward pass for the backward pass
pub(crate) struct LstmCache {
    inputs: Array3<f64>,
    /// h_0 ..= h_T
    hidden: Vec<Array2<f64>>,
    /// c_0 ..= c_T
    cells: Vec<Array2<f64>>,
    /// Activated gates per step, (batch, 4 * hidden)
    gates: Vec<Array2<f64>>,
}

pub(crate) struct LstmGrads {
    w_x: Array2<f64>,
    w_h: Array2<f64>,
    b: Array1<f64>,
}

pub(crate) struct LstmMoments {
    w_x: Moments<ndarray::Ix2>,
    w_h: Moments<ndarray::Ix2>,
    b: Moments<ndarray::Ix1>,
}

impl Lstm {
    pub(crate) fn new(rng: &mut impl Rng, input: usize, hidden: usize) -> Self {
        let mut b = Array1::zeros(4 * hidden);
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);

        Self {
            w_x: glorot_uniform(rng, input, 4 * hidden),
            w_h: glorot_uniform(rng, hidden, 4 * hidden),
            b,
            hidden,
        }
    }

    pub(crate) fn moments(&self) -> LstmMoments {
        LstmMoments {
            w_x: Moments::zeros_like(&self.w_x),
            w_h: Moments::zeros_like(&self.w_h),
            b: Moments::zeros_like(&self.b),
        }
    }

    /// Run the layer over `inputs` (batch, time, features).
    ///
    /// Returns every hidden state as (batch, time, hidden).
    pub(crate) fn forward(&self, inputs: &Array3<f64>) -> (Array3<f64>, LstmCache) {
        let (batch, steps, _) = inputs.dim();
        let h = self.hidden;

        let mut hidden = Vec::with_capacity(steps + 1);
        let mut cells = Vec::with_capacity(steps + 1);
        let mut gates = Vec::with_capacity(steps);
        hidden.push(Array2::zeros((batch, h)));
        cells.push(Array2::zeros((batch, h)));

        let mut outputs = Array3::zeros((batch, steps, h));

        for t in 0..steps {
            let x_t = inputs.index_axis(Axis(1), t);
            let mut z = x_t.dot(&self.w_x) + hidden[t].dot(&self.w_h) + &self.b;

            z.slice_mut(s![.., 0..2 * h]).mapv_inplace(sigmoid);
            z.slice_mut(s![.., 2 * h..3 * h]).mapv_inplace(f64::tanh);
            z.slice_mut(s![.., 3 * h..]).mapv_inplace(sigmoid);

            let i = z.slice(s![.., 0..h]);
            let f = z.slice(s![.., h..2 * h]);
            let g = z.slice(s![.., 2 * h..3 * h]);
            let o = z.slice(s![.., 3 * h..]);

            let c = &f * &cells[t] + &i * &g;
            let h_t = &o * &c.mapv(f64::tanh);

            outputs.index_axis_mut(Axis(1), t).assign(&h_t);
            cells.push(c);
            hidden.push(h_t);
            gates.push(z);
        }

        let cache = LstmCache {
            inputs: inputs.clone(),
            hidden,
            cells,
            gates,
        };
        (outputs, cache)
    }

    /// Back-propagate `d_outputs` (batch, time, hidden).
    ///
    /// Returns parameter gradients and the gradient w.r.t. the inputs.
    pub(crate) fn backward(
        &self,
        cache: &LstmCache,
        d_outputs: &Array3<f64>,
    ) -> (LstmGrads, Array3<f64>) {
        let (batch, steps, _) = cache.inputs.dim();
        let h = self.hidden;

        let mut grads = LstmGrads {
            w_x: Array2::zeros(self.w_x.raw_dim()),
            w_h: Array2::zeros(self.w_h.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
        };
        let mut d_inputs = Array3::zeros(cache.inputs.raw_dim());
        let mut dh_next = Array2::<f64>::zeros((batch, h));
        let mut dc_next = Array2::<f64>::zeros((batch, h));
        let mut dz = Array2::<f64>::zeros((batch, 4 * h));

        for t in (0..steps).rev() {
            let z = &cache.gates[t];
            let i = z.slice(s![.., 0..h]);
            let f = z.slice(s![.., h..2 * h]);
            let g = z.slice(s![.., 2 * h..3 * h]);
            let o = z.slice(s![.., 3 * h..]);

            let c_prev = &cache.cells[t];
            let tanh_c = cache.cells[t + 1].mapv(f64::tanh);

            let dh = &d_outputs.index_axis(Axis(1), t) + &dh_next;
            let d_o = &dh * &tanh_c;
            let dc = &dc_next + &(&dh * &o * &tanh_c.mapv(|v| 1.0 - v * v));

            let d_i = &dc * &g;
            let d_f = &dc * c_prev;
            let d_g = &dc * &i;
            dc_next = &dc * &f;

            dz.slice_mut(s![.., 0..h])
                .assign(&(d_i * &i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., h..2 * h])
                .assign(&(d_f * &f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * h..3 * h])
                .assign(&(d_g * &g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * h..])
                .assign(&(d_o * &o.mapv(|v| v * (1.0 - v))));

            let x_t = cache.inputs.index_axis(Axis(1), t);
            grads.w_x += &x_t.t().dot(&dz);
            grads.w_h += &cache.hidden[t].t().dot(&dz);
            grads.b += &dz.sum_axis(Axis(0));

            d_inputs
                .index_axis_mut(Axis(1), t)
                .assign(&dz.dot(&self.w_x.t()));
            dh_next = dz.dot(&self.w_h.t());
        }

        (grads, d_inputs)
    }

    pub(crate) fn apply(&mut self, adam: &Adam, grads: &LstmGrads, moments: &mut LstmMoments) {
        adam.update(&mut self.w_x, &grads.w_x, &mut moments.w_x);
        adam.update(&mut self.w_h, &grads.w_h, &mut moments.w_h);
        adam.update(&mut self.b, &grads.b, &mut moments.b);
    }
}
