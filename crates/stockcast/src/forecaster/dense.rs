use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use rand::Rng;

use super::adam::{Adam, Moments};
use super::lstm::glorot_uniform;

/// Fully connected layer, `y = x · W + b`
#[derive(Debug, Clone)]
pub(crate) struct Dense {
    w: Array2<f64>,
    b: Array1<f64>,
}

pub(crate) struct DenseGrads {
    w: Array2<f64>,
    b: Array1<f64>,
}

pub(crate) struct DenseMoments {
    w: Moments<Ix2>,
    b: Moments<Ix1>,
}

impl Dense {
    pub(crate) fn new(rng: &mut impl Rng, input: usize, output: usize) -> Self {
        Self {
            w: glorot_uniform(rng, input, output),
            b: Array1::zeros(output),
        }
    }

    pub(crate) fn moments(&self) -> DenseMoments {
        DenseMoments {
            w: Moments::zeros_like(&self.w),
            b: Moments::zeros_like(&self.b),
        }
    }

    pub(crate) fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.w) + &self.b
    }

    /// Gradients for `d_out` given the forward input `x`, plus `d_x`
    pub(crate) fn backward(&self, x: &Array2<f64>, d_out: &Array2<f64>) -> (DenseGrads, Array2<f64>) {
        let grads = DenseGrads {
            w: x.t().dot(d_out),
            b: d_out.sum_axis(Axis(0)),
        };
        (grads, d_out.dot(&self.w.t()))
    }

    pub(crate) fn apply(&mut self, adam: &Adam, grads: &DenseGrads, moments: &mut DenseMoments) {
        adam.update(&mut self.w, &grads.w, &mut moments.w);
        adam.update(&mut self.b, &grads.b, &mut moments.b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_backward_matches_linear_map() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = Dense::new(&mut rng, 3, 2);
        let x = array![[1.0, 2.0, 3.0], [-1.0, 0.0, 0.5]];
        let out = layer.forward(&x);
        assert_eq!(out.dim(), (2, 2));

        let d_out = array![[1.0, 0.0], [0.0, 1.0]];
        let (grads, d_x) = layer.backward(&x, &d_out);
        assert_eq!(grads.w[[2, 0]], 3.0);
        assert_eq!(grads.w[[2, 1]], 0.5);
        assert_eq!(grads.b, array![1.0, 1.0]);
        assert_eq!(d_x[[0, 1]], layer.w[[1, 0]]);
    }
}
