//! # Core Models Module
//!
//! Typed records for the data that flows through the state-identification pipeline.
//!
//! ## Overview
//!
//! Intermediate and final results are explicit structs rather than string-keyed frames:
//! column lookup by name only happens at the table boundary, where a missing column is
//! a typed error, and everything downstream works on matrices and labeled records.
//!
//! ## Key Components
//!
//! - [`bounds`] - Axis-aligned search boxes and regular grids over them
//! - [`table`] - Named numeric columns over a row-major matrix (collective variables, descriptors)
//! - [`labels`] - Local minima and the per-frame basin label/selection record
//! - [`dataset`] - The final aligned dataset of CVs, labels and descriptors
//!
//! ## Usage
//!
//! ```ignore
//! use statescope::core::models::table::NumericTable;
//!
//! let table = NumericTable::from_rows(
//!     vec!["time".into(), "d1".into(), "d2".into()],
//!     vec![vec![0.0, 0.1, 0.2], vec![1.0, 0.3, 0.4]],
//! )?;
//! let cvs = table.select(&["d1", "d2"])?;
//! ```

pub mod bounds;
pub mod dataset;
pub mod labels;
pub mod table;
