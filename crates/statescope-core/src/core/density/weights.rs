use nalgebra::DVector;

use super::DensityError;

/// Converts per-frame log-weights into relative linear weights.
///
/// Weights are shifted by the largest log-weight before exponentiation, so the largest weight
/// is exactly one. The estimator only uses relative weights, so the shift does not change the
/// resulting density. `-inf` maps to a zero weight; `NaN` and `+inf` are rejected.
pub fn from_log_weights(log_weights: &[f64]) -> Result<DVector<f64>, DensityError> {
    if let Some((i, lw)) = log_weights
        .iter()
        .enumerate()
        .find(|(_, lw)| lw.is_nan() || **lw == f64::INFINITY)
    {
        return Err(DensityError::InvalidInput(format!(
            "log-weight at row {i} is not usable: {lw}"
        )));
    }

    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Ok(DVector::zeros(log_weights.len()));
    }

    Ok(DVector::from_iterator(
        log_weights.len(),
        log_weights.iter().map(|lw| (lw - max).exp()),
    ))
}

/// Kish effective sample size, `(Σw)² / Σw²`.
pub fn effective_sample_size(weights: &DVector<f64>) -> f64 {
    let sum = weights.sum();
    let sum_sq = weights.norm_squared();
    if sum_sq == 0.0 {
        0.0
    } else {
        sum * sum / sum_sq
    }
}
