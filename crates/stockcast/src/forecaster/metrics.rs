use ndarray::ArrayView1;

/// Mean squared error
pub fn mean_squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let diff = &y_true - &y_pred;
    diff.mapv(|d| d * d).sum() / y_true.len() as f64
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_perfect_and_mean_predictions() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);

        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(y.view(), mean.view()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let bad = array![3.0, 2.0, 1.0];
        assert!((r2_score(y.view(), bad.view()) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![2.0, 2.0];
        assert_eq!(r2_score(y.view(), array![2.0, 2.0].view()), 1.0);
        assert_eq!(r2_score(y.view(), array![2.0, 2.5].view()), 0.0);
    }

    #[test]
    fn test_mse() {
        let y = array![1.0, 2.0];
        let p = array![2.0, 4.0];
        assert_eq!(mean_squared_error(y.view(), p.view()), 2.5);
    }
}
