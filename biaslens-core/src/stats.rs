//! Small descriptive-statistics helpers shared by the analyzer.
//!
//! Baselines describe the whole reference set, so the standard deviation here
//! is the population form (divide by `n`), not the sample form.

/// Relative tolerance under which two scores, or a spread, count as equal / zero.
pub const RELATIVE_TOLERANCE: f64 = 1e-9;

/// Absolute tolerance at the magnitude of `scale` (never below `RELATIVE_TOLERANCE`).
pub fn tolerance(scale: f64) -> f64 {
    RELATIVE_TOLERANCE * scale.abs().max(1.0)
}

/// Whether `a` and `b` are equal up to [`tolerance`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= tolerance(a.abs().max(b.abs()))
}

/// Whether a spread is zero at the scale of `mean_val`.
pub fn is_zero_spread(std_dev: f64, mean_val: f64) -> bool {
    std_dev.abs() <= tolerance(mean_val)
}

fn all_equal(data: &[f64]) -> bool {
    data.windows(2).all(|w| w[0] == w[1])
}

/// Compute the mean of a slice. Returns 0.0 for an empty slice.
///
/// A constant slice yields its value exactly.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    if all_equal(data) {
        return data[0];
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation given a precomputed mean.
///
/// Snaps to exactly 0.0 when the data is constant or the spread is below
/// rounding noise at the mean's magnitude.
pub fn population_std_dev(data: &[f64], mean_val: f64) -> f64 {
    if data.is_empty() || all_equal(data) {
        return 0.0;
    }
    let variance = data.iter().map(|x| (x - mean_val).powi(2)).sum::<f64>() / data.len() as f64;
    let std_dev = variance.sqrt();
    if is_zero_spread(std_dev, mean_val) {
        0.0
    } else {
        std_dev
    }
}

/// Standard score of `value`, or `None` when the spread is zero.
pub fn z_score(value: f64, mean_val: f64, std_dev: f64) -> Option<f64> {
    if is_zero_spread(std_dev, mean_val) {
        None
    } else {
        Some((value - mean_val) / std_dev)
    }
}

/// Least-squares slope of `values` against their index (0, 1, 2, ...).
///
/// Returns 0.0 for fewer than two points.
pub fn index_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);

    let (numerator, denominator) =
        values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });

    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}
