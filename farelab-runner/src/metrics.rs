//! Regression metrics: pure functions over actual/predicted slices.
//!
//! Conventions:
//! - Empty input yields 0.0 for every metric.
//! - R² of constant actuals is 0.0 (the total sum of squares is zero).
//! - MAPE skips rows whose actual value is zero and is reported in percent.

use serde::{Deserialize, Serialize};

/// Aggregate metrics for one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub count: usize,
}

impl RegressionMetrics {
    /// Compute all metrics. Pairs beyond the shorter slice are ignored.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        let (actual, predicted) = (&actual[..n], &predicted[..n]);
        Self {
            r2: r2(actual, predicted),
            mae: mae(actual, predicted),
            rmse: rmse(actual, predicted),
            mape: mape(actual, predicted),
            count: n,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn pairs<'a>(actual: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    actual.iter().copied().zip(predicted.iter().copied())
}

/// Coefficient of determination: 1 - SS_res / SS_tot.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let mean = actual[..n].iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot < 1e-12 {
        return 0.0;
    }
    let ss_res: f64 = pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    pairs(actual, predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n as f64
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let mse = pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n as f64;
    mse.sqrt()
}

/// Mean absolute percentage error, in percent. Rows with a zero actual are skipped.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, count) = pairs(actual, predicted)
        .filter(|(a, _)| *a != 0.0)
        .fold((0.0, 0usize), |(s, c), (a, p)| (s + ((a - p) / a).abs(), c + 1));
    if count == 0 {
        return 0.0;
    }
    100.0 * sum / count as f64
}
