use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Bounds must cover at least one dimension")]
    Empty,
    #[error("Invalid bounds for dimension {dim}: ({min}, {max}); expected finite values with min < max")]
    Invalid { dim: usize, min: f64, max: f64 },
    #[error("A regular grid needs at least 2 points per dimension, got {0}")]
    TooFewGridPoints(usize),
}

/// An axis-aligned box, one `(min, max)` pair per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    ranges: Vec<(f64, f64)>,
}

impl Bounds {
    pub fn new(ranges: Vec<(f64, f64)>) -> Result<Self, BoundsError> {
        if ranges.is_empty() {
            return Err(BoundsError::Empty);
        }
        for (dim, &(min, max)) in ranges.iter().enumerate() {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(BoundsError::Invalid { dim, min, max });
            }
        }
        Ok(Self { ranges })
    }

    pub fn dim(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[(f64, f64)] {
        &self.ranges
    }

    pub fn lower(&self, dim: usize) -> f64 {
        self.ranges[dim].0
    }

    pub fn upper(&self, dim: usize) -> f64 {
        self.ranges[dim].1
    }

    pub fn width(&self, dim: usize) -> f64 {
        self.ranges[dim].1 - self.ranges[dim].0
    }

    pub fn diagonal(&self) -> f64 {
        (0..self.dim())
            .map(|d| self.width(d) * self.width(d))
            .sum::<f64>()
            .sqrt()
    }

    pub fn center(&self) -> Vec<f64> {
        self.ranges.iter().map(|(lo, hi)| 0.5 * (lo + hi)).collect()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(&self.ranges)
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(&self.ranges) {
            *v = v.clamp(*lo, *hi);
        }
    }

    /// True when any coordinate lies within `tolerance · width` of its range edge.
    pub fn is_on_boundary(&self, x: &[f64], tolerance: f64) -> bool {
        x.iter().zip(&self.ranges).any(|(v, (lo, hi))| {
            let margin = tolerance * (hi - lo);
            *v - lo <= margin || hi - *v <= margin
        })
    }

    /// `n` evenly spaced values over dimension `dim`, endpoints included.
    pub fn axis(&self, dim: usize, n: usize) -> Result<Vec<f64>, BoundsError> {
        if n < 2 {
            return Err(BoundsError::TooFewGridPoints(n));
        }
        let (lo, hi) = self.ranges[dim];
        let step = (hi - lo) / (n - 1) as f64;
        Ok((0..n)
            .map(|k| if k == n - 1 { hi } else { lo + step * k as f64 })
            .collect())
    }

    /// Every point of the regular grid with `n` values per axis, last axis varying fastest.
    pub fn grid(&self, n: usize) -> Result<Vec<Vec<f64>>, BoundsError> {
        let axes = (0..self.dim())
            .map(|d| self.axis(d, n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(axes.into_iter().multi_cartesian_product().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_and_inverted_ranges() {
        assert_eq!(Bounds::new(vec![]), Err(BoundsError::Empty));
        assert!(matches!(
            Bounds::new(vec![(0.0, 1.0), (2.0, 2.0)]),
            Err(BoundsError::Invalid { dim: 1, .. })
        ));
        assert!(matches!(
            Bounds::new(vec![(f64::NEG_INFINITY, 1.0)]),
            Err(BoundsError::Invalid { dim: 0, .. })
        ));
    }

    #[test]
    fn axis_includes_both_endpoints() {
        let bounds = Bounds::new(vec![(-1.0, 1.0)]).unwrap();
        assert_eq!(bounds.axis(0, 5).unwrap(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(bounds.axis(0, 1), Err(BoundsError::TooFewGridPoints(1)));
    }

    #[test]
    fn grid_varies_last_axis_fastest() {
        let bounds = Bounds::new(vec![(0.0, 1.0), (10.0, 20.0)]).unwrap();
        let grid = bounds.grid(2).unwrap();
        assert_eq!(
            grid,
            vec![
                vec![0.0, 10.0],
                vec![0.0, 20.0],
                vec![1.0, 10.0],
                vec![1.0, 20.0]
            ]
        );
    }

    #[test]
    fn clamp_and_contains_respect_ranges() {
        let bounds = Bounds::new(vec![(0.0, 1.0), (0.0, 1.0)]).unwrap();
        let mut x = vec![-0.5, 1.5];
        assert!(!bounds.contains(&x));
        bounds.clamp(&mut x);
        assert_eq!(x, vec![0.0, 1.0]);
        assert!(bounds.contains(&x));
    }

    #[test]
    fn boundary_detection_uses_relative_margin() {
        let bounds = Bounds::new(vec![(0.0, 10.0)]).unwrap();
        assert!(bounds.is_on_boundary(&[0.001], 1e-3));
        assert!(bounds.is_on_boundary(&[9.995], 1e-3));
        assert!(!bounds.is_on_boundary(&[5.0], 1e-3));
    }

    #[test]
    fn diagonal_and_center() {
        let bounds = Bounds::new(vec![(0.0, 3.0), (0.0, 4.0)]).unwrap();
        assert_eq!(bounds.diagonal(), 5.0);
        assert_eq!(bounds.center(), vec![1.5, 2.0]);
    }
}
