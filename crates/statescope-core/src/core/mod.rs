//! # Core Module
//!
//! The numerical and data foundation of statescope.
//!
//! ## Overview
//!
//! Everything in this module is free of pipeline state: data tables are plain values,
//! the density estimator is immutable once fitted, and the free-energy surface is a
//! cheap-to-clone handle over that fitted estimator.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Named numeric tables, basin labels and the labeled output dataset
//! - **Density Estimation** ([`density`]) - Weighted Gaussian KDE with Scott/Silverman bandwidth rules
//! - **Free Energy** ([`fes`]) - The `-kT log p` surface built on a fitted density, plus grid export
//! - **File I/O** ([`io`]) - Reading and writing PLUMED COLVAR and CSV tables
//!
//! ## Scientific Foundation
//!
//! - **Kernel density estimation** with a full covariance bandwidth matrix derived from the
//!   weighted sample covariance and the effective sample size of the weights
//! - **Reweighting** of biased simulations through per-frame log-weights
//! - **Boltzmann inversion** of the estimated density into a free-energy surface

pub mod density;
pub mod fes;
pub mod io;
pub mod models;
