//! # Density Estimation Module
//!
//! Weighted Gaussian kernel density estimation in D dimensions.
//!
//! ## Overview
//!
//! [`kde::WeightedKde`] fits a full-covariance Gaussian kernel to a weighted point cloud and
//! evaluates the log-density at arbitrary query points. The kernel covariance is the weighted
//! sample covariance scaled by the squared factor of a [`bandwidth::BandwidthMethod`], where
//! the sample size entering the rule is the effective sample size of the weights.
//!
//! Weights for biased simulations usually come as log-weights; [`weights::from_log_weights`]
//! converts them into relative linear weights without overflow.

pub mod bandwidth;
pub mod kde;
pub mod weights;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DensityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Kernel covariance is not positive-definite (dimension {dim}, bandwidth factor {factor})")]
    SingularBandwidth { dim: usize, factor: f64 },

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}
