use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::DensityError;
use super::bandwidth::BandwidthMethod;
use super::weights::effective_sample_size;

/// Conditional kernel variances below this fraction of the dimension's kernel variance are
/// treated as zero, which catches exactly collinear collective variables.
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-14;

/// Lowest log-density ever reported. Queries so far from the support that the squared
/// Mahalanobis distance overflows saturate here, and `-kT` times this stays finite.
pub const LOG_DENSITY_FLOOR: f64 = -1e300;

/// A Gaussian kernel density estimate over a weighted point cloud.
///
/// The kernel covariance `K = Σ·h²` is fixed at fit time, where `Σ` is the unbiased weighted
/// covariance of the points and `h` the factor of the chosen [`BandwidthMethod`]. Points are
/// stored pre-whitened by the Cholesky factor of `K`, so evaluating a kernel reduces to a
/// squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct WeightedKde {
    dataset: DMatrix<f64>,
    weights: DVector<f64>,
    log_weights: Vec<f64>,
    whitened: Vec<f64>,
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    cholesky_l: DMatrix<f64>,
    factor: f64,
    effective_sample_size: f64,
    log_norm: f64,
}

impl WeightedKde {
    /// Fits the estimator to `points` (one row per sample, one column per dimension).
    ///
    /// # Errors
    ///
    /// - [`DensityError::InvalidInput`] for an empty point set, zero dimensions, non-finite
    ///   coordinates, a weight vector of the wrong length, or negative/non-finite weights.
    /// - [`DensityError::DegenerateInput`] if every weight is zero. A lone point with zero
    ///   weight is reported as [`DensityError::InvalidInput`] instead.
    /// - [`DensityError::SingularBandwidth`] if the kernel covariance is not positive-definite.
    #[instrument(level = "debug", skip_all, fields(n = points.nrows(), dim = points.ncols()))]
    pub fn fit(
        points: DMatrix<f64>,
        weights: Option<DVector<f64>>,
        method: BandwidthMethod,
    ) -> Result<Self, DensityError> {
        let (n, dim) = points.shape();
        if n == 0 {
            return Err(DensityError::InvalidInput(
                "cannot fit a density to zero points".to_string(),
            ));
        }
        if dim == 0 {
            return Err(DensityError::InvalidInput(
                "points must have at least one dimension".to_string(),
            ));
        }
        if let Some(pos) = points.iter().position(|v| !v.is_finite()) {
            return Err(DensityError::InvalidInput(format!(
                "non-finite coordinate in row {} column {}",
                pos % n,
                pos / n
            )));
        }

        let weights = match weights {
            Some(w) => {
                if w.len() != n {
                    return Err(DensityError::InvalidInput(format!(
                        "expected {n} weights, found {}",
                        w.len()
                    )));
                }
                if let Some((i, v)) = w
                    .iter()
                    .enumerate()
                    .find(|(_, v)| !v.is_finite() || **v < 0.0)
                {
                    return Err(DensityError::InvalidInput(format!(
                        "weight at row {i} must be non-negative and finite, got {v}"
                    )));
                }
                w
            }
            None => DVector::from_element(n, 1.0),
        };

        let total = weights.sum();
        if total <= 0.0 && n == 1 {
            return Err(DensityError::InvalidInput(
                "the only point has zero weight".to_string(),
            ));
        }
        if total <= 0.0 {
            return Err(DensityError::DegenerateInput(
                "all weights are zero".to_string(),
            ));
        }
        let normalized = &weights / total;
        let n_eff = effective_sample_size(&weights);
        let factor = method.factor(n_eff, dim)?;

        let singular = DensityError::SingularBandwidth { dim, factor };
        let bias_correction = 1.0 - normalized.norm_squared();
        if bias_correction <= 0.0 {
            return Err(singular);
        }
        if points.column_iter().any(|c| c.max() == c.min()) {
            return Err(singular);
        }

        let mean = points.tr_mul(&normalized);
        let mean_row = mean.transpose();
        let mut centered = points.clone();
        for mut row in centered.row_iter_mut() {
            row -= &mean_row;
        }
        let mut scaled = centered.clone();
        for (i, mut row) in scaled.row_iter_mut().enumerate() {
            row *= normalized[i];
        }

        let covariance = centered.tr_mul(&scaled) / bias_correction;
        let kernel_covariance = &covariance * (factor * factor);

        let cholesky = kernel_covariance.clone().cholesky().ok_or(singular.clone())?;
        let cholesky_l = cholesky.l();
        for j in 0..dim {
            let conditional = cholesky_l[(j, j)] * cholesky_l[(j, j)];
            if !conditional.is_finite()
                || conditional <= RELATIVE_VARIANCE_FLOOR * kernel_covariance[(j, j)]
            {
                return Err(singular);
            }
        }

        // Centers are whitened relative to the mean; queries are shifted the same way.
        let whitened_columns = cholesky_l
            .solve_lower_triangular(&centered.transpose())
            .ok_or(singular)?;
        let mut whitened = Vec::with_capacity(n * dim);
        for column in whitened_columns.column_iter() {
            whitened.extend(column.iter().copied());
        }

        let log_det_l: f64 = cholesky_l.diagonal().iter().map(|v| v.ln()).sum();
        let log_norm = -total.ln() - 0.5 * dim as f64 * (2.0 * PI).ln() - log_det_l;
        let log_weights = weights.iter().map(|w| w.ln()).collect();

        debug!(
            effective_sample_size = n_eff,
            factor, "Fitted weighted Gaussian KDE."
        );

        Ok(Self {
            dataset: points,
            weights,
            log_weights,
            whitened,
            mean,
            covariance,
            cholesky_l,
            factor,
            effective_sample_size: n_eff,
            log_norm,
        })
    }

    pub fn dim(&self) -> usize {
        self.dataset.ncols()
    }

    pub fn len(&self) -> usize {
        self.dataset.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.nrows() == 0
    }

    /// The fitted points, one row per sample.
    pub fn dataset(&self) -> &DMatrix<f64> {
        &self.dataset
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Unbiased weighted sample covariance of the fitted points.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Covariance of each Gaussian kernel, `covariance · factor²`.
    pub fn kernel_covariance(&self) -> DMatrix<f64> {
        &self.cholesky_l * self.cholesky_l.transpose()
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn effective_sample_size(&self) -> f64 {
        self.effective_sample_size
    }

    /// Natural-log density at a single point.
    pub fn log_density_at(&self, x: &[f64]) -> Result<f64, DensityError> {
        if x.len() != self.dim() {
            return Err(DensityError::DimensionMismatch {
                expected: self.dim(),
                found: x.len(),
            });
        }
        Ok(self.log_density_unchecked(x.iter().copied()))
    }

    /// Natural-log density at every row of `query`.
    ///
    /// Each row is evaluated independently of the others, so the result for a row does not
    /// depend on how queries are batched.
    pub fn log_density(&self, query: &DMatrix<f64>) -> Result<DVector<f64>, DensityError> {
        if query.ncols() != self.dim() {
            return Err(DensityError::DimensionMismatch {
                expected: self.dim(),
                found: query.ncols(),
            });
        }
        Ok(self.log_density_rows_unchecked(query))
    }

    /// Caller guarantees `query` has exactly `dim()` columns.
    pub(crate) fn log_density_rows_unchecked(&self, query: &DMatrix<f64>) -> DVector<f64> {
        #[cfg(not(feature = "parallel"))]
        let values: Vec<f64> = (0..query.nrows())
            .map(|i| self.log_density_unchecked(query.row(i).iter().copied()))
            .collect();

        #[cfg(feature = "parallel")]
        let values: Vec<f64> = (0..query.nrows())
            .into_par_iter()
            .map(|i| self.log_density_unchecked(query.row(i).iter().copied()))
            .collect();

        DVector::from_vec(values)
    }

    /// Caller guarantees `x` yields exactly `dim()` coordinates.
    ///
    /// The result never drops below [`LOG_DENSITY_FLOOR`].
    pub(crate) fn log_density_unchecked(&self, x: impl Iterator<Item = f64>) -> f64 {
        let dim = self.dim();
        let mut z = DVector::from_iterator(dim, x) - &self.mean;
        if !self.cholesky_l.solve_lower_triangular_mut(&mut z) {
            return LOG_DENSITY_FLOOR;
        }

        // Streaming log-sum-exp over all kernels.
        let mut max = f64::NEG_INFINITY;
        let mut acc = 0.0;
        for (i, lw) in self.log_weights.iter().enumerate() {
            if *lw == f64::NEG_INFINITY {
                continue;
            }
            let center = &self.whitened[i * dim..(i + 1) * dim];
            let dist_sq: f64 = z
                .iter()
                .zip(center)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let term = lw - 0.5 * dist_sq;
            if term == f64::NEG_INFINITY {
                continue;
            }
            if term > max {
                acc = acc * (max - term).exp() + 1.0;
                max = term;
            } else {
                acc += (term - max).exp();
            }
        }

        if max == f64::NEG_INFINITY {
            return LOG_DENSITY_FLOOR;
        }
        (max + acc.ln() + self.log_norm).max(LOG_DENSITY_FLOOR)
    }
}
