//! # Workflows Module
//!
//! High-level entry points that run state identification from loaded tables to a labeled
//! dataset.
//!
//! ## Overview
//!
//! The pipeline is an explicit sequence of typed stages. Each stage owns the result of the
//! previous one and can only be produced from it, so assigning basins before fitting a
//! surface is not expressible:
//!
//! ```text
//! Loaded --fit--> Fitted --find_minima--> MinimaFound --assign_basins--> BasinsAssigned
//! ```
//!
//! - **State Identification** ([`identify`]) - The stage types, [`identify::identify_states`]
//!   to run them in one call, and `collect_data` to export the labeled frames.

pub mod identify;
