//! Regression quality metrics reported per target after training.

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean squared error.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / actual.len() as f64
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Coefficient of determination. A constant target (zero total variance)
/// scores 0 rather than dividing by zero.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Mean absolute percentage error. An epsilon in the denominator keeps
/// zero actuals from blowing up the ratio.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / (a + 1e-10)).abs())
        .sum::<f64>()
        / actual.len() as f64
        * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(mae(&y, &y), 0.0);
        assert_eq!(rmse(&y, &y), 0.0);
        assert_eq!(r2(&y, &y), 1.0);
        assert!(mape(&y, &y) < 1e-6);
    }

    #[test]
    fn test_mae_known_value() {
        assert_eq!(mae(&[1.0, 3.0], &[2.0, 1.0]), 1.5);
    }

    #[test]
    fn test_rmse_known_value() {
        let value = rmse(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((value - (12.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_r2_mean_prediction_is_zero() {
        let actual = [1.0, 2.0, 3.0];
        let mean_pred = [2.0, 2.0, 2.0];
        assert!(r2(&actual, &mean_pred).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target_defined_as_zero() {
        assert_eq!(r2(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(mae(&[], &[]), 0.0);
        assert_eq!(r2(&[], &[]), 0.0);
        assert_eq!(mape(&[], &[]), 0.0);
    }
}
