//! # Engine Module
//!
//! The algorithmic stages of state identification: locating the local minima of a scalar
//! field and assigning sampled frames to the basins around them.
//!
//! ## Overview
//!
//! Both stages work against the [`ScalarField`](crate::core::fes::ScalarField) trait rather
//! than a concrete free-energy surface, so they can be exercised on analytic test functions
//! and reused for any smooth landscape. Configuration is typed and validated up front, and
//! long-running evaluation reports through an optional progress callback.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Minimizer strategy and options, batching, weight sources and the pipeline builder
//! - **Minima Search** ([`minima`]) - Grid or random-restart seeding, bounded simplex refinement, deduplication
//! - **Basin Assignment** ([`basins`]) - Nearest-minimum labeling with free-energy cutoff selection
//! - **Progress Monitoring** ([`progress`]) - Progress events for user feedback
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation

pub mod basins;
pub mod config;
pub mod error;
pub mod minima;
pub mod progress;
pub(crate) mod simplex;
