use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

use super::density::DensityError;
use super::density::kde::WeightedKde;
use super::models::bounds::Bounds;

/// A scalar function over D-dimensional space.
///
/// This is the only contract the minima search and basin assignment rely on.
pub trait ScalarField {
    fn dim(&self) -> usize;

    /// Value at `x`. Callers pass exactly [`dim`](Self::dim) coordinates.
    fn value(&self, x: &[f64]) -> f64;

    /// Values at every row of `points`.
    fn values(&self, points: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_iterator(
            points.nrows(),
            (0..points.nrows()).map(|i| {
                let row: Vec<f64> = points.row(i).iter().copied().collect();
                self.value(&row)
            }),
        )
    }
}

/// Adapts a closure into a [`ScalarField`].
pub struct FnField<F> {
    dim: usize,
    f: F,
}

impl<F: Fn(&[f64]) -> f64> FnField<F> {
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F: Fn(&[f64]) -> f64> ScalarField for FnField<F> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn value(&self, x: &[f64]) -> f64 {
        (self.f)(x)
    }
}

/// The free-energy surface `F(x) = -kT · ln p(x)` of a fitted density.
///
/// Cloning is cheap; clones share the same immutable estimator.
#[derive(Debug, Clone)]
pub struct FreeEnergySurface {
    kde: Arc<WeightedKde>,
    kbt: f64,
}

impl FreeEnergySurface {
    pub fn new(kde: WeightedKde, kbt: f64) -> Result<Self, DensityError> {
        Self::from_shared(Arc::new(kde), kbt)
    }

    pub fn from_shared(kde: Arc<WeightedKde>, kbt: f64) -> Result<Self, DensityError> {
        if !(kbt.is_finite() && kbt > 0.0) {
            return Err(DensityError::InvalidInput(format!(
                "temperature scale kT must be positive and finite, got {kbt}"
            )));
        }
        Ok(Self { kde, kbt })
    }

    pub fn kde(&self) -> &WeightedKde {
        &self.kde
    }

    pub fn kbt(&self) -> f64 {
        self.kbt
    }

    pub fn energy_at(&self, x: &[f64]) -> Result<f64, DensityError> {
        Ok(-self.kbt * self.kde.log_density_at(x)?)
    }

    pub fn energies(&self, points: &DMatrix<f64>) -> Result<DVector<f64>, DensityError> {
        Ok(self.kde.log_density(points)? * -self.kbt)
    }

    /// Evaluates the surface on a regular 1D or 2D grid for plotting.
    pub fn on_grid(&self, bounds: &Bounds, points_per_dim: usize) -> Result<FesGrid, DensityError> {
        let dim = self.kde.dim();
        if bounds.dim() != dim {
            return Err(DensityError::DimensionMismatch {
                expected: dim,
                found: bounds.dim(),
            });
        }
        if dim > 2 {
            return Err(DensityError::InvalidInput(format!(
                "grid export supports 1 or 2 dimensions, the surface has {dim}"
            )));
        }

        let invalid =
            |e: super::models::bounds::BoundsError| DensityError::InvalidInput(e.to_string());
        let axes = (0..dim)
            .map(|d| bounds.axis(d, points_per_dim))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let points = bounds.grid(points_per_dim).map_err(invalid)?;
        let matrix = DMatrix::from_row_iterator(points.len(), dim, points.into_iter().flatten());
        let values = self.energies(&matrix)?;

        Ok(FesGrid {
            axes,
            values: values.iter().copied().collect(),
        })
    }
}

impl ScalarField for FreeEnergySurface {
    fn dim(&self) -> usize {
        self.kde.dim()
    }

    fn value(&self, x: &[f64]) -> f64 {
        -self.kbt * self.kde.log_density_unchecked(x.iter().copied())
    }

    fn values(&self, points: &DMatrix<f64>) -> DVector<f64> {
        debug_assert_eq!(points.ncols(), self.dim());
        self.kde.log_density_rows_unchecked(points) * -self.kbt
    }
}

/// Free energies on a regular grid; the last axis varies fastest in `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct FesGrid {
    pub axes: Vec<Vec<f64>>,
    pub values: Vec<f64>,
}

impl FesGrid {
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Vec::len).collect()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.values.iter().copied().filter(|v| v.is_finite()).reduce(f64::min)
    }

    /// `(coordinates, free energy)` for every grid node in storage order.
    pub fn nodes(&self) -> impl Iterator<Item = (Vec<f64>, f64)> + '_ {
        let shape = self.shape();
        self.values.iter().enumerate().map(move |(flat, &value)| {
            let mut rem = flat;
            let mut coords = vec![0.0; shape.len()];
            for d in (0..shape.len()).rev() {
                coords[d] = self.axes[d][rem % shape[d]];
                rem /= shape[d];
            }
            (coords, value)
        })
    }
}
