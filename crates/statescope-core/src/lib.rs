//! # statescope Core Library
//!
//! Identification of metastable conformational states from molecular simulation data.
//! Collective-variable time series are turned into a free-energy surface (FES) through a
//! weighted Gaussian kernel density estimate, local minima of that surface become basins,
//! and every sampled frame is labeled with its nearest basin plus a free-energy selection flag.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`NumericTable`, `LabeledDataset`),
//!   the weighted kernel density estimator, the free-energy surface value object, and
//!   table file I/O.
//!
//! - **[`engine`]: The Algorithmic Stages.** The local-minima search over a scalar field,
//!   basin assignment and free-energy selection, together with their configuration,
//!   error and progress-reporting types.
//!
//! - **[`workflows`]: The Public API.** A typed-stage pipeline
//!   (`Loaded → Fitted → MinimaFound → BasinsAssigned`) that sequences the engine over
//!   the core data models and produces the final labeled dataset.

pub mod core;
pub mod engine;
pub mod workflows;
