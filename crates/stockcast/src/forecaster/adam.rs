//! Adam optimizer over ndarray parameters.
//!
//! ```text
//! m = beta1 * m + (1 - beta1) * g
//! v = beta2 * v + (1 - beta2) * g^2
//! m_hat = m / (1 - beta1^t)
//! v_hat = v / (1 - beta2^t)
//! p = p - learning_rate * m_hat / (sqrt(v_hat) + epsilon)
//! ```

use ndarray::{Array, Dimension, Zip};

#[derive(Debug, Clone)]
pub(crate) struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
}

/// First and second moment estimates for one parameter tensor
#[derive(Debug, Clone)]
pub(crate) struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    pub(crate) fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }
}

impl Adam {
    pub(crate) fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
        }
    }

    /// Advance the timestep; call once per batch before any `update`.
    pub(crate) fn step(&mut self) {
        self.t += 1;
    }

    pub(crate) fn update<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        moments: &mut Moments<D>,
    ) {
        let (beta1, beta2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let bias_correction1 = 1.0 - beta1.powi(self.t);
        let bias_correction2 = 1.0 - beta2.powi(self.t);

        Zip::from(param)
            .and(grad)
            .and(&mut moments.m)
            .and(&mut moments.v)
            .for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.01);
        let mut param = array![1.0, -2.0, 0.5];
        let grad = array![0.3, -4.0, 0.0];
        let mut moments = Moments::zeros_like(&param);

        adam.step();
        adam.update(&mut param, &grad, &mut moments);

        // bias-corrected first step is lr * sign(g)
        assert!((param[0] - 0.99).abs() < 1e-6);
        assert!((param[1] + 1.99).abs() < 1e-6);
        assert_eq!(param[2], 0.5);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut adam = Adam::new(0.1);
        let mut param = array![[5.0, -3.0]];
        let mut moments = Moments::zeros_like(&param);

        for _ in 0..500 {
            let grad = param.mapv(|p| 2.0 * p);
            adam.step();
            adam.update(&mut param, &grad, &mut moments);
        }
        assert!(param.iter().all(|p| p.abs() < 1e-2));
    }
}
